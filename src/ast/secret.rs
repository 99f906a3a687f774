//! Credential-name heuristic
//!
//! Classifies a parameter name as secret by substring match. The same
//! function drives input classification and the environment guard in
//! generated tool stubs.
//!
//! Known blind spot: a secret whose name contains none of the markers
//! (e.g. `pin`, `passphrase_hint`) is treated as non-secret.

/// Substrings that mark a name as a credential
const SECRET_MARKERS: &[&str] = &[
    "key",
    "token",
    "password",
    "passwd",
    "secret",
    "credential",
    "auth",
    "webhook",
];

/// Connection-string style suffixes
const SECRET_SUFFIXES: &[&str] = &["connection_string", "conn_string", "conn_str", "_dsn"];

/// True if `name` looks like it holds a credential
pub fn is_secret_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SECRET_MARKERS.iter().any(|m| lower.contains(m))
        || SECRET_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Environment variable a secret named `name` is read from
pub fn env_var_name(name: &str) -> String {
    name.to_ascii_uppercase()
}
