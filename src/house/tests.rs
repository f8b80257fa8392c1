use super::*;

#[test]
fn test_house_id_range() {
    assert_eq!(HouseId::new(0).map(HouseId::index), Some(0));
    assert_eq!(HouseId::new(NUM_HOUSES - 1).map(HouseId::index), Some(7));
    assert!(HouseId::new(NUM_HOUSES).is_none());
}

#[test]
fn test_all_houses_in_order() {
    let ids: Vec<usize> = HouseId::all().map(HouseId::index).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_parse_decimal() {
    assert_eq!(parse_house_id("0").unwrap().index(), 0);
    assert_eq!(parse_house_id("5").unwrap().index(), 5);
    assert_eq!(parse_house_id(" 2 ").unwrap().index(), 2);
    assert_eq!(parse_house_id("+1").unwrap().index(), 1);
}

#[test]
fn test_parse_prefixed() {
    assert_eq!(parse_house_id("0x6").unwrap().index(), 6);
    assert_eq!(parse_house_id("0X6").unwrap().index(), 6);
    assert_eq!(parse_house_id("0o7").unwrap().index(), 7);
    assert_eq!(parse_house_id("0b11").unwrap().index(), 3);
}

#[test]
fn test_parse_empty() {
    assert_eq!(parse_house_id(""), Err(ParseError::Empty));
    assert_eq!(parse_house_id("   "), Err(ParseError::Empty));
}

#[test]
fn test_parse_garbage() {
    assert!(matches!(parse_house_id("abc"), Err(ParseError::InvalidFormat(_))));
    assert!(matches!(parse_house_id("1.5"), Err(ParseError::InvalidFormat(_))));
    assert!(matches!(parse_house_id("0x"), Err(ParseError::InvalidFormat(_))));
    assert!(matches!(parse_house_id("-"), Err(ParseError::InvalidFormat(_))));
    assert!(matches!(parse_house_id("--1"), Err(ParseError::InvalidFormat(_))));
    assert!(matches!(parse_house_id("0x-1"), Err(ParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_out_of_range() {
    assert_eq!(parse_house_id("8"), Err(ParseError::OutOfRange(8)));
    assert_eq!(parse_house_id("-1"), Err(ParseError::OutOfRange(-1)));
    assert_eq!(parse_house_id("0x10"), Err(ParseError::OutOfRange(16)));
}
