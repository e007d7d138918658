//! Line buffer tests

use edge_line_registry::console::line_buffer::{LineBuffer, LINE_SIZE};

#[test]
fn test_line_buffer_push() {
    let mut buf = LineBuffer::new();

    for &c in b"export 17" {
        buf.push(c);
    }

    assert_eq!(buf.as_str(), "export 17");
}

#[test]
fn test_line_buffer_backspace() {
    let mut buf = LineBuffer::new();

    buf.push(b'h');
    buf.push(b'e');
    buf.push(b'l');
    buf.push(b'p');
    buf.backspace();
    buf.backspace();

    assert_eq!(buf.as_str(), "he");
}

#[test]
fn test_line_buffer_backspace_empty() {
    let mut buf = LineBuffer::new();

    buf.backspace(); // should not panic
    assert_eq!(buf.as_str(), "");
}

#[test]
fn test_line_buffer_clear() {
    let mut buf = LineBuffer::new();

    buf.push(b'h');
    buf.push(b'e');
    buf.push(b'l');
    buf.push(b'p');
    buf.clear();

    assert_eq!(buf.as_str(), "");
    assert!(buf.is_empty());
}

#[test]
fn test_line_buffer_overflow() {
    let mut buf = LineBuffer::new();

    for i in 0..(LINE_SIZE as u8 + 6) {
        buf.push(b'a' + (i % 26));
    }

    // Excess input is dropped
    assert_eq!(buf.len(), LINE_SIZE);
    assert!(buf.is_full());
}
