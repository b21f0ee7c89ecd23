use callgrind_index::index::reader::IndexReader;
use callgrind_index::index::writer::write_index;
use callgrind_index::preprocessor::Preprocessor;
use callgrind_index::utils::config::{CostFormat, PreprocessConfig};
use callgrind_index::utils::error::ReaderError;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Preprocess a trace string into an index file inside `dir`
fn build_index(trace: &str, dir: &TempDir) -> PathBuf {
    let model = Preprocessor::new(PreprocessConfig::default())
        .parse(trace.as_bytes())
        .expect("trace should parse");
    let path = dir.path().join("trace.idx");
    write_index(&model, &path).expect("index should write");
    path
}

const SMALLEST_TRACE: &str = "fl=main.php\n\
    fn={main}\n\
    summary: 42\n\
    0 0\n\
    10 5\n\
    cmd: /usr/bin/php\n";

const CALL_EDGE_TRACE: &str = "fl=main.php\n\
    fn={main}\n\
    summary: 100\n\
    0 0\n\
    10 5\n\
    cfn=foo\n\
    calls=1\n\
    7 3\n\
    fl=foo.php\n\
    fn=foo\n\
    1 3\n";

#[test]
fn test_smallest_trace_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = build_index(SMALLEST_TRACE, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Usec).unwrap();
    assert_eq!(reader.function_count(), 1);

    let info = reader.function_info(0, None).unwrap();
    assert_eq!(info.function_name, "{main}");
    assert_eq!(info.filename, "main.php");
    assert_eq!(info.line, 10);
    assert_eq!(info.invocation_count, 1);
    assert_eq!(info.summed_self_cost, "5");
    assert_eq!(info.summed_self_cost_raw, 5);
    assert_eq!(info.summed_inclusive_cost, "5");
    assert_eq!(info.called_from_count, 0);
    assert_eq!(info.sub_call_count, 0);

    assert_eq!(reader.get_header("summary").unwrap(), "42");
    assert_eq!(reader.get_header("runs").unwrap(), "1");
    assert_eq!(reader.get_header("cmd").unwrap(), "/usr/bin/php");
    // Standard headers default to empty, unknown ones too
    assert_eq!(reader.get_header("creator").unwrap(), "");
    assert_eq!(reader.get_header("no-such-header").unwrap(), "");
}

#[test]
fn test_on_disk_layout() {
    let dir = TempDir::new().unwrap();
    let path = build_index(CALL_EDGE_TRACE, &dir);
    let bytes = fs::read(&path).unwrap();

    let word = |index: usize| {
        u32::from_le_bytes(bytes[index * 4..index * 4 + 4].try_into().unwrap())
    };

    // Fixed header: version, headersPos, functionCount
    assert_eq!(word(0), 7);
    let headers_pos = word(1);
    let count = word(2);
    assert_eq!(count, 2);

    // Offsets are strictly increasing and point between the offset
    // table and the headers block
    let table_end = 12 + 4 * count;
    let offsets: Vec<u32> = (0..count as usize).map(|i| word(3 + i)).collect();
    for (i, &offset) in offsets.iter().enumerate() {
        assert!(offset >= table_end);
        assert!(offset < headers_pos);
        if i > 0 {
            assert!(offset > offsets[i - 1]);
        }
    }

    // The headers block is raw newline-terminated text until EOF
    let headers = &bytes[headers_pos as usize..];
    let text = std::str::from_utf8(headers).unwrap();
    assert_eq!(text, "summary: 100\n");
}

#[test]
fn test_function_info_independent_of_access_order() {
    let dir = TempDir::new().unwrap();
    let path = build_index(CALL_EDGE_TRACE, &dir);

    let mut sequential = IndexReader::open(&path, CostFormat::Usec).unwrap();
    let in_order: Vec<_> = (0..2)
        .map(|i| sequential.function_info(i, None).unwrap())
        .collect();

    let mut shuffled = IndexReader::open(&path, CostFormat::Usec).unwrap();
    let second = shuffled.function_info(1, None).unwrap();
    let first = shuffled.function_info(0, None).unwrap();
    let second_again = shuffled.function_info(1, None).unwrap();

    assert_eq!(first, in_order[0]);
    assert_eq!(second, in_order[1]);
    assert_eq!(second_again, in_order[1]);
}

#[test]
fn test_version_gate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.idx");
    // First word is version 6; nothing else needs to be present
    // because the reader must not read past the mismatch
    fs::write(&path, 6u32.to_le_bytes()).unwrap();

    match IndexReader::open(&path, CostFormat::Usec) {
        Err(ReaderError::VersionMismatch { found, expected }) => {
            assert_eq!(found, 6);
            assert_eq!(expected, 7);
        }
        other => panic!("expected VersionMismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_function_index_out_of_range() {
    let dir = TempDir::new().unwrap();
    let path = build_index(SMALLEST_TRACE, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Usec).unwrap();
    match reader.function_info(1, None) {
        Err(ReaderError::FunctionOutOfRange { index, count }) => {
            assert_eq!(index, 1);
            assert_eq!(count, 1);
        }
        other => panic!("expected FunctionOutOfRange, got {:?}", other),
    }
}

#[test]
fn test_edge_index_out_of_range() {
    let dir = TempDir::new().unwrap();
    let path = build_index(SMALLEST_TRACE, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Usec).unwrap();
    assert!(matches!(
        reader.called_from_info(0, 0, None),
        Err(ReaderError::EdgeOutOfRange { index: 0, count: 0 })
    ));
    assert!(matches!(
        reader.sub_call_info(0, 0, None),
        Err(ReaderError::EdgeOutOfRange { index: 0, count: 0 })
    ));
}

#[test]
fn test_edge_queries_are_dual() {
    let dir = TempDir::new().unwrap();
    let path = build_index(CALL_EDGE_TRACE, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Usec).unwrap();

    // {main} is index 0, foo index 1 (first-seen order)
    let outbound = reader.sub_call_info(0, 0, None).unwrap();
    assert_eq!(outbound.function, 1);
    assert_eq!(outbound.line, 7);
    assert_eq!(outbound.call_count, 1);
    assert_eq!(outbound.summed_call_cost, "3");

    let inbound = reader.called_from_info(1, 0, None).unwrap();
    assert_eq!(inbound.function, 0);
    assert_eq!(inbound.line, 7);
    assert_eq!(inbound.call_count, 1);
    assert_eq!(inbound.summed_call_cost, "3");
}

#[test]
fn test_sub_call_edges_sit_behind_caller_edges() {
    // mid has one caller and one sub-call, so reading its sub-call
    // exercises the skip over the calledFrom list
    let trace = "fl=leaf.php\n\
        fn=leaf\n\
        1 2\n\
        fl=mid.php\n\
        fn=mid\n\
        1 4\n\
        cfn=leaf\n\
        calls=1\n\
        3 2\n\
        fl=main.php\n\
        fn={main}\n\
        summary: 100\n\
        0 0\n\
        5 1\n\
        cfn=mid\n\
        calls=1\n\
        9 6\n";
    let dir = TempDir::new().unwrap();
    let path = build_index(trace, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Usec).unwrap();
    let leaf = reader.function_info(0, None).unwrap();
    let mid = reader.function_info(1, None).unwrap();
    assert_eq!(leaf.function_name, "leaf");
    assert_eq!(mid.called_from_count, 1);
    assert_eq!(mid.sub_call_count, 1);

    let into_leaf = reader.sub_call_info(1, 0, None).unwrap();
    assert_eq!(into_leaf.function, 0);
    assert_eq!(into_leaf.line, 3);
    assert_eq!(into_leaf.summed_call_cost, "2");

    let from_main = reader.called_from_info(1, 0, None).unwrap();
    assert_eq!(from_main.function, 2);
    assert_eq!(from_main.line, 9);
    assert_eq!(from_main.summed_call_cost, "6");
}

#[test]
fn test_percent_format_sums_to_hundred() {
    let trace = "fl=a.php\n\
        fn=a\n\
        1 50\n\
        fl=b.php\n\
        fn=b\n\
        1 30\n\
        fl=main.php\n\
        fn={main}\n\
        summary: 100\n\
        0 0\n\
        5 20\n";
    let dir = TempDir::new().unwrap();
    let path = build_index(trace, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Percent).unwrap();
    let rendered: Vec<String> = (0..3)
        .map(|i| reader.function_info(i, None).unwrap().summed_self_cost)
        .collect();
    assert_eq!(rendered, vec!["50.00", "30.00", "20.00"]);

    let total: f64 = rendered.iter().map(|p| p.parse::<f64>().unwrap()).sum();
    assert!((total - 100.0).abs() < 1e-9);
}

#[test]
fn test_per_call_format_override() {
    let dir = TempDir::new().unwrap();
    let path = build_index(SMALLEST_TRACE, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Percent).unwrap();
    // Default percent against summary 42
    assert_eq!(
        reader.function_info(0, None).unwrap().summed_self_cost,
        "11.90"
    );
    // Raw microseconds on request
    assert_eq!(
        reader
            .function_info(0, Some(CostFormat::Usec))
            .unwrap()
            .summed_self_cost,
        "5"
    );
}

#[test]
fn test_msec_format_rounds() {
    let trace = "fl=main.php\n\
        fn={main}\n\
        summary: 10000\n\
        0 0\n\
        10 1500\n";
    let dir = TempDir::new().unwrap();
    let path = build_index(trace, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Msec).unwrap();
    let info = reader.function_info(0, None).unwrap();
    assert_eq!(info.summed_self_cost, "2");
    assert_eq!(info.summed_self_cost_raw, 1500);
}

#[test]
fn test_headers_aggregate_over_runs() {
    let trace = "fl=main.php\n\
        fn={main}\n\
        summary: 100 2048\n\
        0 0\n\
        10 5\n\
        fl=main.php\n\
        fn={main}\n\
        summary: 100 2048\n\
        0 0\n\
        12 7\n\
        cmd: /usr/bin/php\n\
        creator: xdebug 3.2.0\n";
    let dir = TempDir::new().unwrap();
    let path = build_index(trace, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Usec).unwrap();
    assert_eq!(reader.get_header("runs").unwrap(), "2");
    // Time components summed, memory fields ignored
    assert_eq!(reader.get_header("summary").unwrap(), "200");
    assert_eq!(reader.get_header("cmd").unwrap(), "/usr/bin/php");
    assert_eq!(reader.get_header("creator").unwrap(), "xdebug 3.2.0");
}

#[test]
fn test_proxy_trace_roundtrip() {
    let trace = "fl=target.php\n\
        fn=target\n\
        5 100\n\
        fl=proxy.php\n\
        fn=call_user_func\n\
        1 2\n\
        cfn=target\n\
        calls=1\n\
        1 100\n\
        fl=main.php\n\
        fn={main}\n\
        summary: 300\n\
        0 0\n\
        10 50\n\
        cfn=call_user_func\n\
        calls=1\n\
        20 100\n";
    let dir = TempDir::new().unwrap();
    let path = build_index(trace, &dir);

    let mut reader = IndexReader::open(&path, CostFormat::Usec).unwrap();
    assert_eq!(reader.function_count(), 3);

    // target=0, call_user_func=1, {main}=2 in first-seen order
    let proxy = reader.function_info(1, None).unwrap();
    assert_eq!(proxy.function_name, "call_user_func");
    assert_eq!(proxy.called_from_count, 0);
    assert_eq!(proxy.sub_call_count, 0);

    let main = reader.function_info(2, None).unwrap();
    assert_eq!(main.sub_call_count, 1);
    let edge = reader.sub_call_info(2, 0, None).unwrap();
    assert_eq!(edge.function, 0);
    assert_eq!(edge.line, 20);
    assert_eq!(edge.summed_call_cost, "100");
}
