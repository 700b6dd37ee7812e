use std::panic::{AssertUnwindSafe, catch_unwind};

/// Extract per-page text from an in-memory PDF and join the pages with newlines.
///
/// `pdf-extract` panics on some malformed inputs instead of returning an error, so the call is
/// isolated with `catch_unwind` and the panic payload becomes the error message.
pub(super) fn extract_pdf(bytes: &[u8]) -> Result<String, String> {
    let pages = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }))
    .map_err(|payload| format!("PDF parser panicked: {}", panic_message(payload.as_ref())))?
    .map_err(|error| error.to_string())?;

    tracing::trace!(pages = pages.len(), "Decoded PDF pages");
    Ok(pages.join("\n").trim().to_string())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(extract_pdf(b"definitely not a pdf").is_err());
    }

    #[test]
    fn panic_messages_are_recovered() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bad xref"));
        assert_eq!(panic_message(payload.as_ref()), "bad xref");
        let payload: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
