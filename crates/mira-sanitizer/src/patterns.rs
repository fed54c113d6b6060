use once_cell::sync::Lazy;
use regex::Regex;

/// Priority order matters: higher-risk categories run first so earlier
/// redactions remove text that could otherwise confuse a lower-priority
/// pattern (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    PrivateKey,
    CredentialBlob,
    Jwt,
    CloudKey,
    CreditCard,
    Ssn,
    Email,
    Phone,
    PublicIp,
    UserPath,
    UrlToken,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PrivateKey => "private_key",
            Category::CredentialBlob => "credential",
            Category::Jwt => "jwt",
            Category::CloudKey => "cloud_key",
            Category::CreditCard => "credit_card",
            Category::Ssn => "ssn",
            Category::Email => "email",
            Category::Phone => "phone",
            Category::PublicIp => "public_ip",
            Category::UserPath => "path",
            Category::UrlToken => "url_token",
        }
    }

    pub fn placeholder(&self) -> String {
        format!("[REDACTED_{}]", self.as_str().to_uppercase())
    }
}

pub struct Pattern {
    pub category: Category,
    pub regex: &'static Lazy<Regex>,
    /// Post-match validator; `None` means every regex hit counts.
    pub validate: Option<fn(&str) -> bool>,
}

static PRIVATE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-----BEGIN [A-Z ]{0,40}PRIVATE KEY-----[\s\S]{0,4000}?-----END [A-Z ]{0,40}PRIVATE KEY-----").unwrap()
});

static CREDENTIAL_BLOB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:api[_-]?key|secret|password|passwd|client[_-]?secret|access[_-]?token|refresh[_-]?token)\b\s*[:=]\s*['"]?[A-Za-z0-9+/_\-\.=]{8,200}['"]?"#).unwrap()
});

static JWT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\beyJ[A-Za-z0-9_-]{10,500}\.[A-Za-z0-9_-]{10,500}\.[A-Za-z0-9_-]{10,500}\b").unwrap());

static CLOUD_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b|\bAIza[0-9A-Za-z_-]{35}\b|\bya29\.[0-9A-Za-z_-]{20,200}\b")
        .unwrap()
});

static CREDIT_CARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){13,19}\b").unwrap());

static SSN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]{1,200}\.[A-Za-z]{2,24}\b").unwrap()
});

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?1[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b").unwrap()
});

static PUBLIC_IP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|[01]?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|[01]?\d?\d)\b").unwrap()
});

static USER_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:/(?:home|Users)/[A-Za-z0-9_.\-]{1,64}|C:\\Users\\[A-Za-z0-9_.\-]{1,64})(?:/[A-Za-z0-9_.\-]{0,80}){0,200}").unwrap()
});

static URL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[?&](?:token|key|sig|signature|access_token|auth)=[A-Za-z0-9%_\-\.]{8,400}").unwrap()
});

/// Excludes RFC 1918 / loopback / link-local ranges: private-range IPs are
/// not redacted (spec.md §8 scenario 2).
fn is_public_ip(candidate: &str) -> bool {
    let octets: Vec<u8> = candidate.split('.').filter_map(|p| p.parse().ok()).collect();
    let [a, b, ..] = octets[..] else { return true };
    match (a, b) {
        (10, _) => false,
        (172, 16..=31) => false,
        (192, 168) => false,
        (127, _) => false,
        (169, 254) => false,
        (0, _) => false,
        _ => true,
    }
}

fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Fixed priority-ordered pattern set. Private keys, credential blobs,
/// JWTs and cloud keys run before contact/network/path/url families.
pub fn ordered_patterns() -> Vec<Pattern> {
    vec![
        Pattern { category: Category::PrivateKey, regex: &PRIVATE_KEY, validate: None },
        Pattern { category: Category::CredentialBlob, regex: &CREDENTIAL_BLOB, validate: None },
        Pattern { category: Category::Jwt, regex: &JWT, validate: None },
        Pattern { category: Category::CloudKey, regex: &CLOUD_KEY, validate: None },
        Pattern { category: Category::CreditCard, regex: &CREDIT_CARD, validate: Some(luhn_valid) },
        Pattern { category: Category::Ssn, regex: &SSN, validate: None },
        Pattern { category: Category::Email, regex: &EMAIL, validate: None },
        Pattern { category: Category::Phone, regex: &PHONE, validate: None },
        Pattern { category: Category::PublicIp, regex: &PUBLIC_IP, validate: Some(is_public_ip) },
        Pattern { category: Category::UserPath, regex: &USER_PATH, validate: None },
        Pattern { category: Category::UrlToken, regex: &URL_TOKEN, validate: None },
    ]
}

/// The minimal safe subset a misbehaving pattern falls back to: the first
/// four categories (highest risk) are never retired.
pub const MINIMUM_SAFE_CATEGORIES: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_accepts_known_valid_card() {
        assert!(luhn_valid("4111111111111111"));
    }

    #[test]
    fn luhn_rejects_invalid_card() {
        assert!(!luhn_valid("4111111111111112"));
    }

    #[test]
    fn private_ranges_are_not_public() {
        assert!(!is_public_ip("192.168.1.1"));
        assert!(!is_public_ip("10.0.0.5"));
        assert!(!is_public_ip("172.16.0.1"));
        assert!(!is_public_ip("127.0.0.1"));
    }

    #[test]
    fn routable_addresses_are_public() {
        assert!(is_public_ip("8.8.8.8"));
        assert!(is_public_ip("203.0.113.5"));
    }
}
