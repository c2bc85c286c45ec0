use snafu::Snafu;

use super::*;

const MAX_LEN: usize = 200;

/// URL-safe identifier of a piece of content, e.g. a blog post.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Slug {
    type Err = ParseSlug;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let slug = input.trim();

        let valid = !slug.is_empty()
            && slug.len() <= MAX_LEN
            && slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if !valid {
            return Err(ParseSlug::new(input.to_string()));
        }

        Ok(Slug(slug.to_string()))
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu, new)]
#[snafu(display("invalid slug: {text:?}"))]
pub struct ParseSlug {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_blog_slugs() {
        let slug: Slug = "hello-world".parse().unwrap();
        assert_eq!(slug.as_str(), "hello-world");

        let slug: Slug = "  rust_2024.notes ".parse().unwrap();
        assert_eq!(slug.as_str(), "rust_2024.notes", "surrounding whitespace is trimmed");
    }

    #[test]
    fn rejects_empty_and_unsafe_input() {
        for input in ["", "   ", "views:other", "a b", "../etc", "ünïcode"] {
            assert!(input.parse::<Slug>().is_err(), "{input:?} should be rejected");
        }

        let long = "a".repeat(MAX_LEN + 1);
        assert!(long.parse::<Slug>().is_err());
    }
}
