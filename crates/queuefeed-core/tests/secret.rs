use anyhow::Result;
use queuefeed_core::secret::{read_env_key, write_env_file, SecretError, SecretString};
use tempfile::TempDir;

#[test]
fn env_file_holds_exactly_one_key_line() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join(".env");

    write_env_file(&path, "DUNE_API_KEY", &SecretString::new("abc123XYZ"))?;

    assert_eq!(std::fs::read_to_string(&path)?, "DUNE_API_KEY=abc123XYZ\n");
    assert_eq!(read_env_key(&path, "DUNE_API_KEY")?.expose(), "abc123XYZ");
    Ok(())
}

#[test]
fn rewriting_replaces_previous_contents() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join(".env");
    std::fs::write(&path, "OTHER=1\nDUNE_API_KEY=old\n")?;

    write_env_file(&path, "DUNE_API_KEY", &SecretString::new("new"))?;

    assert_eq!(std::fs::read_to_string(&path)?, "DUNE_API_KEY=new\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn env_file_is_owner_only() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new()?;
    let path = dir.path().join(".env");
    std::fs::write(&path, "")?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))?;

    write_env_file(&path, "DUNE_API_KEY", &SecretString::new("abc"))?;

    let mode = std::fs::metadata(&path)?.permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    Ok(())
}

#[test]
fn invalid_keys_and_values_write_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join(".env");

    let err = write_env_file(&path, "1KEY", &SecretString::new("v")).unwrap_err();
    assert!(matches!(err, SecretError::InvalidKey(_)));

    for value in [
        "",
        "two\nlines",
        "carriage\rreturn",
        "with space",
        "quote'd",
        "double\"quote",
        "back`tick",
        "hash#tag",
        "dollar$VAR",
        "back\\slash",
        "nul\0",
    ] {
        let err = write_env_file(&path, "DUNE_API_KEY", &SecretString::new(value)).unwrap_err();
        assert!(
            matches!(err, SecretError::InvalidValue { .. }),
            "value {value:?} gave {err}"
        );
    }

    assert!(!path.exists());
    Ok(())
}

#[test]
fn token_punctuation_reads_back_unchanged() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join(".env");

    for value in ["sk_live-AbC.123", "b64+token/with=padding==", "key:with@punct%~"] {
        write_env_file(&path, "DUNE_API_KEY", &SecretString::new(value))?;
        assert_eq!(read_env_key(&path, "DUNE_API_KEY")?.expose(), value);
    }
    Ok(())
}

#[test]
fn reading_missing_file_or_key_reports_missing() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join(".env");

    assert!(matches!(
        read_env_key(&path, "DUNE_API_KEY"),
        Err(SecretError::Missing { .. })
    ));

    std::fs::write(&path, "OTHER=1\n")?;
    match read_env_key(&path, "DUNE_API_KEY") {
        Err(SecretError::Missing { key, .. }) => assert_eq!(key, "DUNE_API_KEY"),
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[test]
fn secret_is_redacted_when_formatted() {
    let secret = SecretString::new("hunter2");
    assert_eq!(format!("{secret}"), "<redacted>");
    assert!(!format!("{secret:?}").contains("hunter2"));
    assert_eq!(secret.expose(), "hunter2");
}
