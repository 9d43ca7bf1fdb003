use serde::{Deserialize, Serialize};
use tenantd_errors::{TenantError, TenantResult};

/// Postgres identifier limit.
const MAX_IDENTIFIER_LEN: usize = 63;
/// Every tenant schema is prefixed so it can never collide with shared
/// schemas or reserved namespaces.
pub const SCHEMA_PREFIX: &str = "tenant_";
/// 63 minus the 7-char prefix.
pub const MAX_SLUG_LEN: usize = MAX_IDENTIFIER_LEN - SCHEMA_PREFIX.len();

const RESERVED_SLUGS: [&str; 3] = ["public", "information_schema", "pg_catalog"];

/// Validated, normalized tenant schema name.
///
/// The only way to obtain one is [`SchemaName::parse`], so holding a
/// `SchemaName` proves the contained identifier is safe to interpolate into
/// `SET search_path` / DDL statements (which cannot take bind parameters).
/// Deserialization goes through `parse` as well, so values crossing a wire
/// or workflow-replay boundary are re-validated on entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SchemaName {
    slug: String,
}

impl SchemaName {
    /// Normalizes and validates a raw slug.
    ///
    /// Normalization lowercases, maps hyphens to underscores and collapses
    /// repeated separators; it is deliberately not injective on raw input,
    /// which is why uniqueness is enforced on the normalized form.
    /// Deterministic and total: always returns a result, never panics.
    pub fn parse(raw: &str) -> TenantResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TenantError::validation_error("slug must not be empty"));
        }
        // Defense-in-depth belt alongside parameterization: reject SQL
        // metacharacters outright before normalization even looks at them.
        for forbidden in ["'", "\"", ";", "--", "/*", "*/", "\\", "\0"] {
            if trimmed.contains(forbidden) {
                return Err(TenantError::validation_error(format!(
                    "slug contains forbidden sequence {forbidden:?}"
                )));
            }
        }

        let mut slug = String::with_capacity(trimmed.len());
        let mut prev_separator = true; // also strips a leading separator
        for ch in trimmed.chars() {
            let ch = ch.to_ascii_lowercase();
            match ch {
                'a'..='z' | '0'..='9' => {
                    slug.push(ch);
                    prev_separator = false;
                }
                '-' | '_' => {
                    if !prev_separator {
                        slug.push('_');
                        prev_separator = true;
                    }
                }
                _ => {
                    return Err(TenantError::validation_error(format!(
                        "slug contains invalid character {ch:?}"
                    )));
                }
            }
        }
        if slug.ends_with('_') {
            slug.pop();
        }

        if slug.is_empty() {
            return Err(TenantError::validation_error(
                "slug contains no usable characters",
            ));
        }
        if !slug.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
            return Err(TenantError::validation_error(
                "slug must start with a letter",
            ));
        }
        if slug.len() > MAX_SLUG_LEN {
            return Err(TenantError::validation_error(format!(
                "slug exceeds {MAX_SLUG_LEN} characters after normalization"
            )));
        }
        if RESERVED_SLUGS.contains(&slug.as_str()) || slug.starts_with("pg_") {
            return Err(TenantError::validation_error(format!(
                "slug {slug:?} is reserved"
            )));
        }

        Ok(Self { slug })
    }

    /// The normalized slug without the prefix.
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// The full schema identifier, `tenant_<slug>`.
    pub fn schema_name(&self) -> String {
        format!("{SCHEMA_PREFIX}{}", self.slug)
    }

    /// Double-quoted identifier for statement interpolation. Safe because
    /// the charset excludes quotes by construction.
    pub fn quoted(&self) -> String {
        format!("\"{SCHEMA_PREFIX}{}\"", self.slug)
    }
}

impl std::fmt::Display for SchemaName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{SCHEMA_PREFIX}{}", self.slug)
    }
}

impl std::str::FromStr for SchemaName {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for SchemaName {
    type Error = TenantError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl<'de> Deserialize<'de> for SchemaName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        SchemaName::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Tenant scheduling tier, mapped to a fairness weight so heavier tiers get
/// proportionally more priority on shared queues without separate queues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TenantTier {
    #[default]
    #[serde(rename = "STANDARD")]
    Standard,
    #[serde(rename = "PRIORITY")]
    Priority,
}

impl TenantTier {
    pub fn fairness_weight(&self) -> u8 {
        match self {
            TenantTier::Standard => 1,
            TenantTier::Priority => 4,
        }
    }
}

/// Derived routing decision for one dispatch. Recomputed on every dispatch,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRoute {
    pub queue_name: String,
    pub fairness_key: String,
    pub fairness_weight: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_slugs() {
        for raw in ["acme", "acme2", "a", "acme_corp", "a1_b2_c3"] {
            let name = SchemaName::parse(raw).unwrap();
            assert_eq!(name.slug(), raw);
            assert_eq!(name.schema_name(), format!("tenant_{raw}"));
        }
    }

    #[test]
    fn normalizes_hyphens_case_and_runs() {
        assert_eq!(SchemaName::parse("Acme-Corp").unwrap().slug(), "acme_corp");
        assert_eq!(SchemaName::parse("acme--corp").unwrap().slug(), "acme_corp");
        assert_eq!(SchemaName::parse("acme_-corp").unwrap().slug(), "acme_corp");
        assert_eq!(SchemaName::parse("  acme  ").unwrap().slug(), "acme");
        assert_eq!(SchemaName::parse("-acme-").unwrap().slug(), "acme");
    }

    #[test]
    fn distinct_raw_slugs_collide_after_normalization() {
        let a = SchemaName::parse("acme-corp").unwrap();
        let b = SchemaName::parse("acme_corp").unwrap();
        assert_eq!(a.schema_name(), b.schema_name());
    }

    #[test]
    fn rejects_empty_and_garbage() {
        for raw in ["", "   ", "---", "_", "9acme", "1"] {
            assert!(SchemaName::parse(raw).is_err(), "should reject {raw:?}");
        }
    }

    #[test]
    fn rejects_sql_metacharacters() {
        for raw in [
            "acme;drop schema public",
            "acme'--",
            "acme\"x",
            "acme/*y*/",
            "acme\\z",
        ] {
            assert!(SchemaName::parse(raw).is_err(), "should reject {raw:?}");
        }
    }

    #[test]
    fn rejects_reserved_names() {
        for raw in ["public", "PUBLIC", "information_schema", "pg_catalog", "pg_temp"] {
            assert!(SchemaName::parse(raw).is_err(), "should reject {raw:?}");
        }
    }

    #[test]
    fn rejects_overlong_slugs() {
        let at_limit = "a".repeat(MAX_SLUG_LEN);
        assert!(SchemaName::parse(&at_limit).is_ok());
        let over = "a".repeat(MAX_SLUG_LEN + 1);
        assert!(SchemaName::parse(&over).is_err());
        // prefixed form must never exceed the identifier limit
        assert_eq!(
            SchemaName::parse(&at_limit).unwrap().schema_name().len(),
            63
        );
    }

    #[test]
    fn parse_is_deterministic() {
        for raw in ["Acme-Corp", "x_y-z", "team--42"] {
            let a = SchemaName::parse(raw).unwrap();
            let b = SchemaName::parse(raw).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn deserialization_revalidates() {
        let ok: Result<SchemaName, _> = serde_json::from_str("\"acme\"");
        assert!(ok.is_ok());
        let bad: Result<SchemaName, _> = serde_json::from_str("\"acme;drop\"");
        assert!(bad.is_err());
    }

    #[test]
    fn tier_weights() {
        assert_eq!(TenantTier::Standard.fairness_weight(), 1);
        assert_eq!(TenantTier::Priority.fairness_weight(), 4);
        assert_eq!(TenantTier::default(), TenantTier::Standard);
    }
}
