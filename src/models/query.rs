// models/query.rs
use mongodb::bson::{doc, Document};
use serde::Deserialize;

/// Explicit pagination contract. `All` replaces the historical "size == 0
/// means everything" sentinel; callers opting into it get an unbounded
/// result set deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    All,
    Page { page: u64, size: u64 },
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::from_params(None, None)
    }
}

impl Pagination {
    pub const DEFAULT_SIZE: u64 = 20;

    /// Wire params to pagination: `size == 0` is the unpaginated sentinel.
    pub fn from_params(page: Option<u64>, size: Option<u64>) -> Self {
        match size {
            Some(0) => Pagination::All,
            Some(size) => Pagination::Page {
                page: page.unwrap_or(1).max(1),
                size,
            },
            None => Pagination::Page {
                page: page.unwrap_or(1).max(1),
                size: Self::DEFAULT_SIZE,
            },
        }
    }

    pub fn pages(&self, total: u64) -> u64 {
        match self {
            Pagination::All => 1,
            Pagination::Page { size, .. } => total.div_ceil(*size),
        }
    }

    /// `(page, size)` for response metadata; unpaginated reports one page
    /// holding everything.
    pub fn meta(&self, total: u64) -> (u64, u64) {
        match self {
            Pagination::All => (1, total),
            Pagination::Page { page, size } => (*page, *size),
        }
    }

    pub fn skip(&self) -> u64 {
        match self {
            Pagination::All => 0,
            Pagination::Page { page, size } => (page - 1) * size,
        }
    }

    pub fn limit(&self) -> Option<i64> {
        match self {
            Pagination::All => None,
            Pagination::Page { size, .. } => Some(*size as i64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn direction(&self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

/// Case-insensitive substring match document for a string field.
pub fn like_regex(fragment: &str) -> Document {
    doc! { "$regex": escape_regex(fragment), "$options": "i" }
}

fn escape_regex(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_zero_means_unpaginated() {
        assert_eq!(Pagination::from_params(Some(3), Some(0)), Pagination::All);
        assert_eq!(Pagination::All.limit(), None);
        assert_eq!(Pagination::All.skip(), 0);
    }

    #[test]
    fn defaults_apply_when_params_missing() {
        let p = Pagination::from_params(None, None);
        assert_eq!(p, Pagination::Page { page: 1, size: Pagination::DEFAULT_SIZE });
    }

    #[test]
    fn page_math() {
        let p = Pagination::from_params(Some(3), Some(10));
        assert_eq!(p.skip(), 20);
        assert_eq!(p.limit(), Some(10));
        assert_eq!(p.pages(25), 3);
        assert_eq!(p.pages(30), 3);
        assert_eq!(p.pages(31), 4);
        assert_eq!(Pagination::All.pages(999), 1);
    }

    #[test]
    fn unpaginated_meta_reports_one_full_page() {
        assert_eq!(Pagination::All.meta(42), (1, 42));
        let p = Pagination::from_params(Some(2), Some(10));
        assert_eq!(p.meta(42), (2, 10));
    }

    #[test]
    fn regex_fragments_are_escaped() {
        let d = like_regex("98.7+");
        assert_eq!(d.get_str("$regex").unwrap(), "98\\.7\\+");
        assert_eq!(d.get_str("$options").unwrap(), "i");
    }
}
