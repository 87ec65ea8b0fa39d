use gbf::{
    CalendarDurationArray, CategoricalArray, CharArray, CompressionMode, DatetimeArray, DurationArray, GbfValue,
    LogicalArray, NumericArray, ReadOptions, StringArray, StructValue, WriteOptions,
};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use tempfile::NamedTempFile;

fn wrap(leaf: GbfValue) -> GbfValue {
    GbfValue::Struct(StructValue { fields: vec![("v".to_string(), leaf)] })
}

/// Writes `leaf` as the sole field of a struct root, reads the whole file
/// back, and returns the `v` field — every leaf kind needs a struct root per
/// the writer's contract, but the round-trip laws are about the leaf itself.
fn roundtrip(leaf: &GbfValue, opts: WriteOptions) -> GbfValue {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    gbf::write_file(&path, &wrap(leaf.clone()), opts).unwrap();
    let tree = gbf::read_file(&path, ReadOptions::default()).unwrap();
    match tree {
        GbfValue::Struct(s) => s.fields.into_iter().next().unwrap().1,
        other => panic!("expected struct root, got {other:?}"),
    }
}

#[test]
fn scalar_double_round_trips() {
    let value = GbfValue::Numeric(NumericArray::scalar(42.0));
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);
}

#[test]
fn row_major_input_is_stored_column_major_and_reads_back_correctly() {
    // [[1,2,3],[4,5,6]] — shape (2,3).
    let value = GbfValue::Numeric(NumericArray::from_f64_row_major(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);

    if let GbfValue::Numeric(n) = &back {
        let mut got = Vec::new();
        for chunk in n.real_le.chunks(8) {
            got.push(gbf::bytesio::read_f64_le(chunk));
        }
        assert_eq!(got, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    } else {
        panic!("expected numeric");
    }
}

#[test]
fn logical_array_round_trips() {
    let value = GbfValue::Logical(LogicalArray { shape: vec![1, 5], data: vec![1, 0, 1, 1, 0] });
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);
}

#[test]
fn string_array_with_missing_entry_round_trips() {
    let value = GbfValue::String(StringArray {
        shape: vec![1, 3],
        data: vec![Some("alpha".to_string()), None, Some("".to_string())],
    });
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);
    if let GbfValue::String(s) = &back {
        assert!(s.data[1].is_none(), "missing entry must decode as None, not empty string");
    }
}

#[test]
fn char_array_round_trips_utf16() {
    let value = GbfValue::Char(CharArray::from_str_row("hi \u{1F600}"));
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);
}

#[test]
fn datetime_array_with_nat_round_trips() {
    let value = GbfValue::Datetime(DatetimeArray {
        shape: vec![1, 2],
        tz: Some("UTC".to_string()),
        locale: Some("en_US".to_string()),
        format: Some("yyyy-MM-dd HH:mm:ss.SSS Z".to_string()),
        is_nat: vec![0, 1],
        ms: vec![1_700_000_000_000, 0],
    });
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);
}

#[test]
fn datetime_array_without_tz_locale_format_round_trips() {
    let value = GbfValue::Datetime(DatetimeArray {
        shape: vec![1, 1],
        tz: None,
        locale: None,
        format: None,
        is_nat: vec![0],
        ms: vec![0],
    });
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);
}

#[test]
fn duration_array_round_trips() {
    let value = GbfValue::Duration(DurationArray { shape: vec![1, 2], is_nan: vec![0, 1], ms: vec![60_000, 0] });
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);
}

#[test]
fn calendar_duration_array_round_trips() {
    let value = GbfValue::CalendarDuration(CalendarDurationArray {
        shape: vec![1, 1],
        is_missing: vec![0],
        months: vec![14],
        days: vec![3],
        time_ms: vec![3_600_000],
    });
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);
}

#[test]
fn categorical_array_with_missing_code_round_trips() {
    let value = GbfValue::Categorical(CategoricalArray {
        shape: vec![1, 3],
        categories: vec!["low".to_string(), "medium".to_string(), "high".to_string()],
        codes: vec![0, 2, 3],
    });
    let back = roundtrip(&value, WriteOptions::default());
    assert_eq!(back, value);
}

#[test]
fn empty_numeric_array_shapes_round_trip() {
    for shape in [vec![0u64, 5], vec![5u64, 0], vec![3u64, 0]] {
        let value = GbfValue::Numeric(NumericArray::from_f64_row_major(&shape, &[]));
        let back = roundtrip(&value, WriteOptions::default());
        assert_eq!(back, value, "shape {shape:?} failed to round-trip");
    }
}

#[test]
fn complex_numeric_with_nan_and_infinity_round_trips() {
    let real = [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.0];
    let imag = [1.0, f64::NAN, 2.0, -0.0];
    let mut real_bytes = Vec::new();
    let mut imag_bytes = Vec::new();
    for r in real {
        gbf::bytesio::write_f64_le(&mut real_bytes, r);
    }
    for i in imag {
        gbf::bytesio::write_f64_le(&mut imag_bytes, i);
    }
    let value = GbfValue::Numeric(NumericArray {
        shape: vec![2, 2],
        class: gbf::NumericClass::Double,
        complex: true,
        real_le: real_bytes,
        imag_le: Some(imag_bytes),
    });
    let back = roundtrip(&value, WriteOptions::default());
    if let GbfValue::Numeric(n) = back {
        assert!(n.complex);
        let got_real: Vec<f64> = n.real_le.chunks(8).map(gbf::bytesio::read_f64_le).collect();
        assert!(got_real[0].is_nan());
        assert_eq!(got_real[1], f64::INFINITY);
        assert_eq!(got_real[2], f64::NEG_INFINITY);
    } else {
        panic!("expected numeric");
    }
}

#[test]
fn complex_numeric_with_zero_length_imag_is_rejected_on_write() {
    let value = wrap(GbfValue::Numeric(NumericArray {
        shape: vec![1, 1],
        class: gbf::NumericClass::Double,
        complex: true,
        real_le: vec![0u8; 8],
        imag_le: Some(Vec::new()),
    }));
    let tmp = NamedTempFile::new().unwrap();
    let err = gbf::write_file(tmp.path(), &value, WriteOptions::default()).unwrap_err();
    assert!(matches!(err, gbf::GbfError::InvalidArgument(_)));
}

#[test]
fn non_struct_root_is_rejected_on_write() {
    let value = GbfValue::Numeric(NumericArray::scalar(1.0));
    let tmp = NamedTempFile::new().unwrap();
    let err = gbf::write_file(tmp.path(), &value, WriteOptions::default()).unwrap_err();
    assert!(matches!(err, gbf::GbfError::InvalidArgument(_)));
}

#[test]
fn empty_struct_root_round_trips_with_no_fields() {
    let root = GbfValue::Struct(StructValue { fields: Vec::new() });
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    gbf::write_file(&path, &root, WriteOptions::default()).unwrap();

    let header = gbf::read_header_only(&path).unwrap();
    assert!(header.fields.is_empty());

    let back = gbf::read_file(&path, ReadOptions::default()).unwrap();
    assert_eq!(back, root);
}

#[test]
fn empty_struct_leaf_is_distinguishable_from_empty_interior_struct() {
    let root = GbfValue::Struct(StructValue {
        fields: vec![
            ("explicit_empty".into(), GbfValue::EmptyStruct),
            ("interior_empty".into(), GbfValue::Struct(StructValue { fields: Vec::new() })),
        ],
    });
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    gbf::write_file(&path, &root, WriteOptions::default()).unwrap();

    let header = gbf::read_header_only(&path).unwrap();
    // An explicit empty-struct leaf gets its own field entry with kind "empty_struct";
    // the empty interior struct contributes none (it has no leaves to flatten into).
    assert_eq!(header.fields.len(), 1);
    assert_eq!(header.fields[0].path, "explicit_empty");
    assert_eq!(header.fields[0].kind, "empty_struct");

    let back = gbf::read_file(&path, ReadOptions::default()).unwrap();
    if let GbfValue::Struct(s) = back {
        let explicit = s.fields.iter().find(|(n, _)| n == "explicit_empty").unwrap();
        assert_eq!(explicit.1, GbfValue::EmptyStruct);
        assert!(s.fields.iter().all(|(n, _)| n != "interior_empty"));
    } else {
        panic!("expected struct root");
    }
}

#[test]
fn shape_product_mismatch_is_rejected_on_read() {
    let root = wrap(GbfValue::Numeric(NumericArray::scalar(1.0)));
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    gbf::write_file(&path, &root, WriteOptions::default()).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let header_len = gbf::bytesio::read_u32_le(&bytes[8..12]) as usize;
    let header_text = String::from_utf8(bytes[12..12 + header_len].to_vec()).unwrap();
    // Declaring shape [1,1] but the payload is still 8 bytes makes usize/shape disagree
    // once the reader recomputes the expected length from shape * element width.
    let patched_text = header_text.replacen("\"shape\":[1,1]", "\"shape\":[2,1]", 1);
    assert_ne!(header_text, patched_text, "expected to find a numeric field's shape in the header");
    let mut patched = patched_text.into_bytes();
    // Keep the header the same byte length so offsets/CRC framing stay valid enough to parse;
    // pad/truncate isn't needed since "[1,1]" and "[2,1]" are equal length.
    assert_eq!(patched.len(), header_len);
    let crc = gbf::bytesio::crc32(&{
        let mut scratch = patched.clone();
        let needle = b"\"header_crc32_hex\":\"";
        let pos = scratch.windows(needle.len()).position(|w| w == needle).unwrap() + needle.len();
        scratch[pos..pos + 8].copy_from_slice(b"00000000");
        scratch
    });
    let needle = b"\"header_crc32_hex\":\"";
    let pos = patched.windows(needle.len()).position(|w| w == needle).unwrap() + needle.len();
    patched[pos..pos + 8].copy_from_slice(format!("{crc:08x}").as_bytes());

    bytes.splice(12..12 + header_len, patched);
    std::fs::write(&path, &bytes).unwrap();

    let err = gbf::read_file(&path, ReadOptions::default()).unwrap_err();
    assert!(matches!(err, gbf::GbfError::FieldLayoutInvalid(_)));
}

#[test]
fn deeply_nested_struct_path_resolves() {
    let leaf = GbfValue::Numeric(NumericArray::scalar(99.0));
    let d = GbfValue::Struct(StructValue { fields: vec![("leaf".into(), leaf.clone())] });
    let c = GbfValue::Struct(StructValue { fields: vec![("d".into(), d)] });
    let b = GbfValue::Struct(StructValue { fields: vec![("c".into(), c)] });
    let root = GbfValue::Struct(StructValue { fields: vec![("a".into(), GbfValue::Struct(StructValue { fields: vec![("b".into(), b)] }))] });

    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    gbf::write_file(&path, &root, WriteOptions::default()).unwrap();

    let got = gbf::read_var(&path, "a.b.c.d.leaf", ReadOptions::default()).unwrap();
    assert_eq!(got, leaf);
}

#[test]
fn missing_variable_is_reported_distinctly_from_corruption() {
    let root = GbfValue::Struct(StructValue { fields: vec![("x".into(), GbfValue::Numeric(NumericArray::scalar(1.0)))] });
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    gbf::write_file(&path, &root, WriteOptions::default()).unwrap();

    let err = gbf::read_var(&path, "nonexistent", ReadOptions::default()).unwrap_err();
    assert!(matches!(err, gbf::GbfError::VarNotFound { .. }));
}

#[test]
fn magic_mismatch_is_rejected() {
    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), b"NOTAGBF\x00\x00\x00\x00\x00").unwrap();
    let err = gbf::read_header_only(tmp.path()).unwrap_err();
    assert!(matches!(err, gbf::GbfError::MagicMismatch { .. }));
}

#[test]
fn truncated_file_is_rejected() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    let value = wrap(GbfValue::Numeric(NumericArray::scalar(1.0)));
    gbf::write_file(&path, &value, WriteOptions::default()).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() / 2);
    std::fs::write(&path, &bytes).unwrap();

    assert!(gbf::read_file(&path, ReadOptions::default()).is_err());
}

#[test]
fn corrupted_header_crc_is_rejected() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    let value = wrap(GbfValue::Numeric(NumericArray::scalar(1.0)));
    gbf::write_file(&path, &value, WriteOptions::default()).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    // Flip a byte inside the header JSON region, away from the CRC field.
    let header_len = gbf::bytesio::read_u32_le(&bytes[8..12]) as usize;
    let mutate_at = 12 + header_len / 2;
    bytes[mutate_at] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let err = gbf::read_header_only(&path).unwrap_err();
    assert!(matches!(
        err,
        gbf::GbfError::HeaderCrcMismatch { .. } | gbf::GbfError::HeaderJsonInvalid(_)
    ));
}

#[test]
fn corrupted_compressed_payload_is_detected() {
    let tmp = NamedTempFile::new().unwrap();
    let path = tmp.path().to_path_buf();
    let value = wrap(GbfValue::Numeric(NumericArray::from_f64_row_major(&[1, 2048], &vec![0.0; 2048])));
    let opts = WriteOptions { compression_mode: CompressionMode::Always, ..WriteOptions::default() };
    gbf::write_file(&path, &value, opts).unwrap();

    let header = gbf::read_header_only(&path).unwrap();
    assert_eq!(header.fields[0].compression, "zlib");

    let offset = header.fields[0].offset as usize;
    let mut f = File::options().write(true).open(&path).unwrap();
    f.seek(SeekFrom::Start(offset as u64)).unwrap();
    let mut buf = [0u8; 4];
    let mut existing = File::open(&path).unwrap();
    existing.seek(SeekFrom::Start(offset as u64)).unwrap();
    existing.read_exact(&mut buf).unwrap();
    for b in &mut buf {
        *b ^= 0xFF;
    }
    f.write_all(&buf).unwrap();

    let err = gbf::read_file(&path, ReadOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        gbf::GbfError::DecompressionFailed(_) | gbf::GbfError::FieldCrcMismatch { .. }
    ));
}
