//! Cosmetic Jenkinsfile scaffolder. Per spec: "not required to be
//! semantically intelligent; it is specified here only because the tool
//! contract exposes it." Do not add logic elsewhere that depends on its
//! output beyond emitting it.

pub fn generate_jenkinsfile(
    name: &str,
    description: &str,
    agent: &str,
    env_vars: &[String],
) -> String {
    let lower = description.to_lowercase();
    let mut stages = Vec::new();

    if contains_any(&lower, &["build", "compile", "package"]) {
        stages.push(stage("Build", "echo 'Building...'"));
    }
    if contains_any(&lower, &["test", "check", "validate"]) {
        stages.push(stage("Test", "echo 'Testing...'"));
    }
    if contains_any(&lower, &["deploy", "publish", "release"]) {
        stages.push(stage("Deploy", "echo 'Deploying...'"));
    }
    if contains_any(&lower, &["docker", "container"]) {
        stages.push(stage("Docker", "echo 'Building container...'"));
    }
    if stages.is_empty() {
        stages.push(stage("Run", "echo 'Running...'"));
    }

    let env_block = if env_vars.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = env_vars
            .iter()
            .map(|v| format!("        {v} = '{v}'"))
            .collect();
        format!("    environment {{\n{}\n    }}\n", lines.join("\n"))
    };

    format!(
        "// Description: {description}\npipeline {{\n    agent {agent}\n{env_block}    stages {{\n{}\n    }}\n}}\n",
        stages.join("\n"),
    )
    .replace("_NAME_", name)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn stage(name: &str, step: &str) -> String {
    format!(
        "        stage('{name}') {{\n            steps {{\n                {step}\n            }}\n        }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_includes_matched_stages() {
        let jf = generate_jenkinsfile("demo", "build and test the app", "any", &[]);
        assert!(jf.contains("stage('Build')"));
        assert!(jf.contains("stage('Test')"));
        assert!(!jf.contains("stage('Deploy')"));
    }

    #[test]
    fn test_generate_falls_back_to_run_stage() {
        let jf = generate_jenkinsfile("demo", "does something unrelated", "any", &[]);
        assert!(jf.contains("stage('Run')"));
    }

    #[test]
    fn test_generate_includes_description_marker() {
        let jf = generate_jenkinsfile("demo", "echo hello", "any", &[]);
        assert!(jf.starts_with("// Description: echo hello"));
    }

    #[test]
    fn test_generate_includes_env_block() {
        let jf = generate_jenkinsfile("demo", "build", "any", &["FOO".to_string()]);
        assert!(jf.contains("environment {"));
        assert!(jf.contains("FOO = 'FOO'"));
    }
}
