//! Rich-text sanitization demonstration.
//!
//! This example shows:
//! 1. Sanitizing hostile markup with the stock rich-text policy
//! 2. Loading a custom policy from JSON
//! 3. Validating translated submissions through a `TextField`
//!
//! Run with: `cargo run --example sanitize_rich_text`

use std::collections::BTreeMap;

use content_core::{HtmlPolicy, HtmlSanitizer, TextField};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Rich Text Sanitization Example ===\n");

    // Scenario 1: stock policy
    println!("--- Scenario 1: Stock Rich-Text Policy ---");
    let policy = HtmlPolicy::rich_text();
    let sanitizer = HtmlSanitizer::new(&policy);
    for input in [
        r#"<p onclick="steal()">Hello <b>world</p>"#,
        "<a href=https://example.com/ target=_blank>Example</a>",
        r#"<img src="javascript:alert(1)"><script>alert(2)</script>"#,
        r#"<span class="viur-txt-lead evil" style="color: red; position: fixed">styled</span>"#,
    ] {
        println!("in:  {}", input);
        println!("out: {}\n", sanitizer.sanitize(input));
    }

    // Scenario 2: policy from configuration
    println!("--- Scenario 2: Policy From JSON ---");
    match HtmlPolicy::from_json(r#"{"validTags": ["p", "em"], "validClasses": ["note-*"]}"#) {
        Ok(policy) => println!(
            "out: {}",
            HtmlSanitizer::new(&policy).sanitize(r#"<p class="note-info">A <em>small</em> <b>note</b></p>"#)
        ),
        Err(e) => println!("Invalid policy: {}", e),
    }
    match HtmlPolicy::from_json(r#"{"validClasses": ["bad class"]}"#) {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("Invalid policy (expected): {}", e),
    }

    // Scenario 3: translated field submission
    println!("\n--- Scenario 3: Translated Field ---");
    let field = TextField::new(Some(HtmlPolicy::rich_text()))
        .languages(["de", "en"])
        .max_length(40);
    let mut submitted = BTreeMap::new();
    submitted.insert("de".to_string(), "<p>Hallo <b>Welt</b></p>".to_string());
    submitted.insert("en".to_string(), "<p>Hello <i>world</i></p>".to_string());

    match field.from_client_translations(&submitted) {
        Ok(values) => {
            for (lang, value) in &values {
                println!("{}: {} (tags: {:?})", lang, value, field.search_tags(value));
            }
        }
        Err(e) => println!("Rejected: {}", e),
    }

    submitted.insert("de".to_string(), "<p>Dieser Text ist viel zu lang für das Feld</p>".to_string());
    match field.from_client_translations(&submitted) {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("Rejected (expected): {}; kept {:?}", e, e.accepted()),
    }
}
