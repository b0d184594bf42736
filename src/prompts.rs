//! Instructions sent to the Markdown parsing service.
//!
//! Kept in one place so the extraction behaviour can be reviewed and tested
//! without touching the HTTP client in [`crate::pipeline::extract`].

/// Content guideline sent with every parsing job.
pub const CONTENT_GUIDELINE_INSTRUCTION: &str = r#"You are a highly proficient document parser.
Convert each page of the PDF into clean markdown suitable for large language model processing.
Exclude any non-essential elements such as headers, footers, page numbers, and decorative images.
Preserve the logical structure and hierarchy of the content, using appropriate Markdown syntax for headings, lists, and emphasis.
Ensure that tables are accurately represented in Markdown format."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guideline_suppresses_page_furniture() {
        let text = CONTENT_GUIDELINE_INSTRUCTION;
        assert!(text.contains("headers, footers, page numbers"));
        assert!(text.contains("tables"));
        assert!(!text.starts_with('\n'));
    }
}
