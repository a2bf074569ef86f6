//! Page index demonstration.
//!
//! This example shows:
//! 1. Implementing `Query` for a simple in-memory result set
//! 2. Building and caching a page index
//! 3. Resolving page numbers to resume cursors
//! 4. Refreshing an index after a write
//!
//! Run with: `cargo run --example page_index`

use content_core::{
    Cursor, IndexConfig, IndexManager, MemoryStore, Query, QueryError, QueryRun, SortOrder,
};

/// Articles by one author, newest first.
struct ArticleQuery {
    author: String,
    ids: Vec<u32>,
}

impl Query for ArticleQuery {
    fn filters(&self) -> Vec<(String, String)> {
        vec![("author =".to_string(), self.author.clone())]
    }

    fn orders(&self) -> Vec<(String, SortOrder)> {
        vec![("created".to_string(), SortOrder::Descending)]
    }

    fn limit(&self) -> Option<usize> {
        None
    }

    fn run_keys_only(&self, limit: usize) -> Result<Box<dyn QueryRun + '_>, QueryError> {
        println!("  (executing query, limit {})", limit);
        Ok(Box::new(ArticleRun {
            ids: &self.ids[..self.ids.len().min(limit)],
            position: 0,
        }))
    }
}

struct ArticleRun<'a> {
    ids: &'a [u32],
    position: usize,
}

impl Iterator for ArticleRun<'_> {
    type Item = Result<String, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.get(self.position)?;
        self.position += 1;
        Some(Ok(format!("article/{}", id)))
    }
}

impl QueryRun for ArticleRun<'_> {
    fn cursor(&self) -> Cursor {
        Cursor::new(format!("offset:{}", self.position))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Page Index Example ===\n");

    let store = MemoryStore::new();
    let manager = IndexManager::new(&store, IndexConfig::new(10, 100));
    let mut query = ArticleQuery {
        author: "42".to_string(),
        ids: (1..=25).rev().collect(),
    };

    println!("--- Scenario 1: First Access Builds The Index ---");
    let pages = manager.get_pages(&query)?;
    println!("key:   {}", manager.key_from_query(&query));
    println!("pages: {}", pages.len());

    println!("\n--- Scenario 2: Page Lookups Use The Cache ---");
    for page in ["0", "1", "2", "7", "next"] {
        match manager.cursor_for_page_param(&query, page)? {
            Some(cursor) => println!("page {:>4}: resume at {}", page, cursor),
            None => println!("page {:>4}: start from the beginning", page),
        }
    }

    println!("\n--- Scenario 3: Refresh After A Write ---");
    query.ids.insert(0, 26);
    manager.refresh_index(&query)?;
    println!("pages after refresh: {}", manager.get_pages(&query)?.len());

    Ok(())
}
