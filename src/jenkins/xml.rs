//! Job-configuration XML document: a sandboxed `CpsFlowDefinition` whose
//! only variable part is the XML-escaped Jenkinsfile text.

/// Escape the three characters significant in XML element content
/// (`&`, `<`, `>`). No attribute-quote escaping, since the script body
/// is element content, not an attribute value.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn build_job_config(jenkinsfile_text: &str) -> String {
    format!(
        r#"<flow-definition plugin="workflow-job@2.40">
    <definition class="org.jenkinsci.plugins.workflow.cps.CpsFlowDefinition" plugin="workflow-cps@2.90">
        <script>{}</script>
        <sandbox>true</sandbox>
    </definition>
</flow-definition>
"#,
        escape_xml(jenkinsfile_text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml_basic() {
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("<script>"), "&lt;script&gt;");
    }

    #[test]
    fn test_build_job_config_embeds_escaped_text() {
        let xml = build_job_config("echo 'a < b'");
        assert!(xml.contains("<sandbox>true</sandbox>"));
        assert!(xml.contains("echo 'a &lt; b'"));
        assert!(xml.contains("CpsFlowDefinition"));
    }
}
