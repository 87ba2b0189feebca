// core/src/model/page.rs
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Pagination window. Built from raw query strings so that garbage input
/// falls back to defaults instead of failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
  pub limit: i64,
  pub offset: i64,
}

impl Default for Page {
  fn default() -> Self {
    Page {
      limit: DEFAULT_PAGE_LIMIT,
      offset: 0,
    }
  }
}

/// Query-string form of a page: `?limit=..&offset=..`, kept as strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
  pub limit: Option<String>,
  pub offset: Option<String>,
}

impl Page {
  pub fn new(limit: i64, offset: i64) -> Self {
    let limit = if limit <= 0 {
      DEFAULT_PAGE_LIMIT
    } else {
      limit.min(MAX_PAGE_LIMIT)
    };
    Page {
      limit,
      offset: offset.max(0),
    }
  }

  pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Self {
    let limit = limit.and_then(|l| l.trim().parse::<i64>().ok()).unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = offset.and_then(|o| o.trim().parse::<i64>().ok()).unwrap_or(0);
    Page::new(limit, offset)
  }
}

impl From<&PageQuery> for Page {
  fn from(q: &PageQuery) -> Self {
    Page::parse(q.limit.as_deref(), q.offset.as_deref())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clamps_garbage_to_defaults() {
    assert_eq!(Page::parse(Some("abc"), Some("-4")), Page::default());
    assert_eq!(Page::parse(None, None), Page::default());
    assert_eq!(Page::parse(Some("0"), Some("x")), Page::default());
  }

  #[test]
  fn caps_limit() {
    assert_eq!(Page::parse(Some("1000"), Some("20")), Page { limit: 100, offset: 20 });
    assert_eq!(Page::new(25, 5), Page { limit: 25, offset: 5 });
  }
}
