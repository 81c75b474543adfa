use super::*;

#[test]
fn test_offset_to_position_multiline() {
    let index = TextCoordinateIndex::from_text("ab\ncd\n\nef");
    assert_eq!(index.line_count(), 4);
    assert_eq!(index.offset_to_position(0).unwrap(), Position::new(0, 0));
    assert_eq!(index.offset_to_position(2).unwrap(), Position::new(0, 2));
    assert_eq!(index.offset_to_position(3).unwrap(), Position::new(1, 0));
    assert_eq!(index.offset_to_position(6).unwrap(), Position::new(2, 0));
    assert_eq!(index.offset_to_position(9).unwrap(), Position::new(3, 2));
}

#[test]
fn test_position_to_offset_round_trip() {
    let text = "fn main() {\r\n    let x = 1;\r\n}\n";
    let index = TextCoordinateIndex::from_text(text);
    for offset in 0..=index.len_chars() {
        let pos = index.offset_to_position(offset).unwrap();
        if let Ok(back) = index.position_to_offset(pos.line, pos.column) {
            assert_eq!(back, offset);
        }
    }
    assert_eq!(index.position_to_offset(1, 4).unwrap(), 17);
}

#[test]
fn test_crlf_and_lone_cr_terminate_lines() {
    let index = TextCoordinateIndex::from_text("a\r\nb\rc");
    assert_eq!(index.line_count(), 3);
    assert_eq!(index.line_span(0), Some((0, 1)));
    assert_eq!(index.line_span(1), Some((3, 4)));
    assert_eq!(index.line_span(2), Some((5, 6)));
    assert_eq!(index.offset_to_position(5).unwrap(), Position::new(2, 0));
}

#[test]
fn test_out_of_range() {
    let index = TextCoordinateIndex::from_text("abc\nde");
    assert_eq!(
        index.offset_to_position(7),
        Err(TextIndexError::OutOfRange { offset: 7, len: 6 })
    );
    assert!(index.offset_to_position(6).is_ok());
    assert!(matches!(
        index.position_to_offset(0, 4),
        Err(TextIndexError::PositionOutOfRange { line: 0, column: 4 })
    ));
    assert!(index.position_to_offset(2, 0).is_err());
    assert_eq!(index.position_to_offset(0, 3).unwrap(), 3);
}

#[test]
fn test_columns_count_chars_not_bytes() {
    let index = TextCoordinateIndex::from_text("héllo\nwörld");
    assert_eq!(index.offset_to_position(8).unwrap(), Position::new(1, 2));
    assert_eq!(index.position_to_offset(1, 5).unwrap(), 11);
}

#[test]
fn test_empty_text_has_one_line() {
    let index = TextCoordinateIndex::from_text("");
    assert_eq!(index.line_count(), 1);
    assert_eq!(index.offset_to_position(0).unwrap(), Position::new(0, 0));
    assert_eq!(index.position_to_offset(0, 0).unwrap(), 0);
}
