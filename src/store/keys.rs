use crate::model::{Slug, VisitorToken};

pub fn views(slug: &Slug) -> String {
    format!("views:{slug}")
}

pub fn cooldown(slug: &Slug, visitor: &VisitorToken) -> String {
    format!("view_cooldown:{slug}:{visitor}")
}

pub fn analytics(slug: &Slug, epoch_millis: i64) -> String {
    format!("analytics:{slug}:{epoch_millis}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let slug: Slug = "hello-world".parse().unwrap();
        let visitor = VisitorToken::new("0123456789abcdef".to_string());

        assert_eq!(views(&slug), "views:hello-world");
        assert_eq!(
            cooldown(&slug, &visitor),
            "view_cooldown:hello-world:0123456789abcdef"
        );
        assert_eq!(analytics(&slug, 1700000000000), "analytics:hello-world:1700000000000");
    }
}
