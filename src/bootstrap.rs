//! Bootstrap env for starkclaw.
//!
//! Secrets and endpoint overrides (`PAYMASTER_API_KEY`, `LLM_API_KEY`,
//! `SIGNER_BASE_URL`, ...) persist in `~/.starkclaw/.env` so they never land
//! in the TOML config file.
//!
//! File: `~/.starkclaw/.env` (standard dotenvy format)

use std::path::{Path, PathBuf};

/// Path to the starkclaw `.env` file: `~/.starkclaw/.env`.
pub fn starkclaw_env_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".starkclaw")
        .join(".env")
}

/// Load env vars from `~/.starkclaw/.env` (in addition to the standard `.env`).
///
/// Call this **after** `dotenvy::dotenv()` so that the standard `./.env`
/// takes priority. dotenvy never overwrites existing env vars, so the
/// effective priority is:
///
///   explicit env vars > `./.env` > `~/.starkclaw/.env`
pub fn load_starkclaw_env() {
    let path = starkclaw_env_path();
    if path.exists()
        && let Err(e) = dotenvy::from_path(&path)
    {
        tracing::warn!("Failed to load {}: {}", path.display(), e);
    }
}

/// Set env vars in `~/.starkclaw/.env`, keeping keys already present.
pub fn save_bootstrap_env(vars: &[(&str, &str)]) -> std::io::Result<()> {
    upsert_env_file(&starkclaw_env_path(), vars)
}

/// Rewrite a dotenv file with `vars` replacing same-named entries.
/// Unparseable existing lines are dropped.
pub fn upsert_env_file(path: &Path, vars: &[(&str, &str)]) -> std::io::Result<()> {
    let mut merged: Vec<(String, String)> = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter.filter_map(|entry| entry.ok()).collect(),
        Err(_) => Vec::new(),
    };
    for (key, value) in vars {
        match merged.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => merged.push((key.to_string(), value.to_string())),
        }
    }
    let borrowed: Vec<(&str, &str)> = merged
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    write_env_file(path, &borrowed)
}

/// Write a dotenv file with owner-only permissions.
///
/// Values are double-quoted so that `#` and other shell-special characters
/// are preserved by dotenvy.
pub fn write_env_file(path: &Path, vars: &[(&str, &str)]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = String::new();
    for (key, value) in vars {
        // Escape backslashes and double quotes so a value cannot break out
        // of its quotes and inject another variable.
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        content.push_str(&format!("{}=\"{}\"\n", key, escaped));
    }
    std::fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(path: &Path) -> Vec<(String, String)> {
        dotenvy::from_path_iter(path)
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_write_env_file_round_trips_through_dotenvy() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join("nested").join(".env");

        write_env_file(
            &env_path,
            &[
                ("PAYMASTER_API_KEY", "pk_#with_hash"),
                ("SIGNER_BASE_URL", "https://signer.example.com"),
            ],
        )
        .unwrap();

        let parsed = parse(&env_path);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], ("PAYMASTER_API_KEY".into(), "pk_#with_hash".into()));
        assert_eq!(parsed[1].1, "https://signer.example.com");
    }

    #[test]
    fn test_write_env_file_escapes_quotes() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");

        let malicious = r#"http://evil.com"
INJECTED="pwned"#;
        write_env_file(&env_path, &[("LLM_BASE_URL", malicious)]).unwrap();

        let parsed = parse(&env_path);
        assert_eq!(parsed.len(), 1, "injection must not create extra vars");
        assert_eq!(parsed[0].0, "LLM_BASE_URL");
        assert!(parsed[0].1.contains("INJECTED"));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_env_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        write_env_file(&env_path, &[("LLM_API_KEY", "sk-test")]).unwrap();
        let mode = std::fs::metadata(&env_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_upsert_env_file_keeps_other_keys() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        write_env_file(
            &env_path,
            &[("PAYMASTER_API_KEY", "pk_old"), ("LLM_API_KEY", "sk-keep")],
        )
        .unwrap();

        upsert_env_file(
            &env_path,
            &[("PAYMASTER_API_KEY", "pk_new"), ("SIGNER_REQUESTER", "mobile")],
        )
        .unwrap();

        let parsed = parse(&env_path);
        assert_eq!(
            parsed,
            vec![
                ("PAYMASTER_API_KEY".to_string(), "pk_new".to_string()),
                ("LLM_API_KEY".to_string(), "sk-keep".to_string()),
                ("SIGNER_REQUESTER".to_string(), "mobile".to_string()),
            ]
        );
    }

    #[test]
    fn test_upsert_env_file_creates_missing_file() {
        let dir = tempdir().unwrap();
        let env_path = dir.path().join("fresh").join(".env");
        upsert_env_file(&env_path, &[("LLM_API_KEY", "sk-test")]).unwrap();
        assert_eq!(parse(&env_path).len(), 1);
    }

    #[test]
    fn test_starkclaw_env_path() {
        let path = starkclaw_env_path();
        assert!(path.ends_with(".starkclaw/.env"));
    }
}
