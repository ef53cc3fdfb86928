pub const SESSION_COOKIE: &str = "access_token";

/// The cookie expires before the token it carries; a stale cookie never
/// outlives a stale session.
pub const SESSION_COOKIE_MAX_AGE_SECS: i64 = 15 * 60;

#[must_use]
pub fn session_cookie(token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={SESSION_COOKIE_MAX_AGE_SECS}; HttpOnly; SameSite=None"
    )
}

#[must_use]
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=None")
}

/// Pull the session token out of a raw `Cookie` request header.
#[must_use]
pub fn session_token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE && !value.is_empty() {
            Some(value)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cookie_carries_session_attributes() {
        let header = session_cookie("v1.abc.def");
        assert!(header.starts_with("access_token=v1.abc.def;"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=None"));
        assert!(header.contains("Max-Age=900"));
    }

    #[test]
    fn clear_cookie_zeroes_max_age() {
        let header = clear_session_cookie();
        assert!(header.starts_with("access_token=;"));
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn token_is_found_among_other_cookies() {
        let header = "theme=dark; access_token=v1.p.s; lang=en";
        assert_eq!(session_token_from_cookie_header(header), Some("v1.p.s"));
        assert_eq!(session_token_from_cookie_header("theme=dark"), None);
        assert_eq!(session_token_from_cookie_header("access_token="), None);
    }
}
