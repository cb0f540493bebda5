//! Redaction helpers for log output
//!
//! Session cookies and bearer tokens are account credentials. Anything that
//! might contain them goes through [`Sanitizer`] before it is logged.

use crate::auth::CookieJar;

/// Sanitizer for credential-bearing data
pub struct Sanitizer;

impl Sanitizer {
    /// Sanitizes an email address for safe logging
    ///
    /// # Examples
    ///
    /// ```
    /// use sessionbridge_lib::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::sanitize_email("john.doe@example.com"), "jo...@example.com");
    /// assert_eq!(Sanitizer::sanitize_email("a@b.com"), "***@b.com");
    /// assert_eq!(Sanitizer::sanitize_email("invalid"), "***");
    /// ```
    pub fn sanitize_email(email: &str) -> String {
        match email.split_once('@') {
            Some((local, domain)) if local.chars().count() > 2 => {
                let head: String = local.chars().take(2).collect();
                format!("{}...@{}", head, domain)
            }
            Some((_, domain)) => format!("***@{}", domain),
            None => "***".to_string(),
        }
    }

    /// Sanitizes a token for safe logging, keeping the last 4 characters
    ///
    /// # Examples
    ///
    /// ```
    /// use sessionbridge_lib::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::sanitize_token("sk-ant-REDACTED"), "***mnop");
    /// assert_eq!(Sanitizer::sanitize_token("abc"), "****");
    /// ```
    pub fn sanitize_token(token: &str) -> String {
        let count = token.chars().count();
        if count > 4 {
            let tail: String = token.chars().skip(count - 4).collect();
            format!("***{}", tail)
        } else {
            "****".to_string()
        }
    }

    /// Strips query string and fragment from a URL
    ///
    /// Provider pages carry OAuth codes and share tokens in query strings.
    ///
    /// ```
    /// use sessionbridge_lib::security::Sanitizer;
    ///
    /// assert_eq!(
    ///     Sanitizer::sanitize_url("https://claude.ai/login?code=secret#top"),
    ///     "https://claude.ai/login"
    /// );
    /// ```
    pub fn sanitize_url(url: &str) -> String {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        url[..end].to_string()
    }

    /// Lists cookie names only, e.g. `[sessionKey, lastActiveOrg]`
    pub fn describe_cookies(jar: &CookieJar) -> String {
        let names: Vec<&str> = jar.iter().map(|c| c.name.as_str()).collect();
        format!("[{}]", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Cookie;

    #[test]
    fn test_sanitize_email_normal() {
        assert_eq!(
            Sanitizer::sanitize_email("john.doe@example.com"),
            "jo...@example.com"
        );
    }

    #[test]
    fn test_sanitize_email_short_local() {
        assert_eq!(Sanitizer::sanitize_email("ab@domain.org"), "***@domain.org");
        assert_eq!(Sanitizer::sanitize_email(""), "***");
    }

    #[test]
    fn test_sanitize_token_boundaries() {
        assert_eq!(Sanitizer::sanitize_token("abcd"), "****");
        assert_eq!(Sanitizer::sanitize_token("abcde"), "***bcde");
    }

    #[test]
    fn test_sanitize_token_multibyte() {
        // Must not panic on char boundaries
        assert_eq!(Sanitizer::sanitize_token("ééééééé"), "***éééé");
    }

    #[test]
    fn test_sanitize_url_variants() {
        assert_eq!(
            Sanitizer::sanitize_url("https://sora.com/g/abc?share=xyz"),
            "https://sora.com/g/abc"
        );
        assert_eq!(
            Sanitizer::sanitize_url("https://suno.com/create#draft"),
            "https://suno.com/create"
        );
        assert_eq!(
            Sanitizer::sanitize_url("https://gemini.google.com/app"),
            "https://gemini.google.com/app"
        );
    }

    #[test]
    fn test_describe_cookies_hides_values() {
        let jar = CookieJar::from(vec![
            Cookie::new("sessionKey", "sk-ant-secret"),
            Cookie::new("lastActiveOrg", "org-1"),
        ]);

        let described = Sanitizer::describe_cookies(&jar);
        assert_eq!(described, "[sessionKey, lastActiveOrg]");
        assert!(!described.contains("secret"));
    }
}
