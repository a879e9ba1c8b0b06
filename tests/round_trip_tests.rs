//! End-to-end tests for text -> Parquet -> zstd and back

use std::fs;
use std::path::Path;

use parquet_zstd_archiver::parquet_to_text::read_container_metadata;
use parquet_zstd_archiver::schema_inference::infer_schema;
use parquet_zstd_archiver::zstd_stream::{compress_file, decompress_file, CodecOptions};
use parquet_zstd_archiver::{Pipeline, PipelineConfig, PipelineStats, TextFormat};
use tempfile::{tempdir, TempDir};

fn test_pipeline(root: &TempDir, batch_size: usize, jobs: usize) -> Pipeline {
    let config = PipelineConfig::builder()
        .input_dir(root.path().join("data"))
        .compress_dir(root.path().join("compress"))
        .decompress_dir(root.path().join("decompress"))
        .batch_size(batch_size)
        .compression_level(3)
        .compression_workers(2)
        .chunk_size(64 * 1024)
        .parallel_files(jobs)
        .build()
        .unwrap();
    fs::create_dir_all(&config.input_dir).unwrap();
    Pipeline::new(config)
}

fn write_input(pipeline: &Pipeline, name: &str, content: &str) {
    fs::write(pipeline.config().input_dir.join(name), content).unwrap();
}

fn read_output(pipeline: &Pipeline, name: &str) -> String {
    fs::read_to_string(pipeline.config().decompress_dir.join(name)).unwrap()
}

#[test]
fn test_pipe_file_round_trip() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    write_input(&pipeline, "simple.tbl", "a|b|c\n1|2|3\n4|5|6");

    let schema = infer_schema(pipeline.config().input_dir.join("simple.tbl"), TextFormat::Tbl, 20).unwrap();
    assert_eq!(schema.separator, '|');
    assert_eq!(schema.column_count, 3);
    assert_eq!(schema.column_names, vec!["col_0", "col_1", "col_2"]);

    let mut stats = PipelineStats::new();
    let (forward, reverse) = pipeline.run(&mut stats).unwrap();
    assert!(forward.is_clean());
    assert!(reverse.is_clean());

    assert!(pipeline.config().compress_dir.join("simple.tbl.zstd").exists());
    assert_eq!(read_output(&pipeline, "simple.tbl"), "a|b|c\n1|2|3\n4|5|6");
    assert_eq!(stats.file_count, 1);
    assert_eq!(stats.restored_count, 1);
    assert_eq!(stats.total_original_bytes, 17);
}

#[test]
fn test_intermediate_containers_removed() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    write_input(&pipeline, "clean.csv", "x,y\n1,2");

    let mut stats = PipelineStats::new();
    pipeline.run(&mut stats).unwrap();

    let leftovers: Vec<_> = fs::read_dir(&pipeline.config().compress_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.ends_with(".parquet"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
}

#[test]
fn test_original_extension_survives_archive() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    write_input(&pipeline, "orders.tbl", "1|open\n2|closed");
    write_input(&pipeline, "orders.csv", "1,open\n2,closed");
    write_input(&pipeline, "orders.txt", "1\topen\n2\tclosed");

    for format in TextFormat::ALL {
        let source = pipeline
            .config()
            .input_dir
            .join(format!("orders.{}", format.extension()));
        let outcome = pipeline.compress_file(&source).unwrap();

        let container = root.path().join(format!("check.{}.parquet", format.extension()));
        decompress_file(&outcome.archive, &container, 4096).unwrap();
        let metadata = read_container_metadata(&container).unwrap();
        assert_eq!(metadata.original_extension.as_deref(), Some(format.extension()));
        assert_eq!(metadata.num_rows, 2);
        assert_eq!(metadata.column_hints.get("col_0").map(String::as_str), Some("ZSTD"));

        let restored = pipeline.decompress_file(&outcome.archive).unwrap();
        assert_eq!(restored.original_extension, format.extension());
        assert_eq!(
            restored.output.file_name().unwrap().to_str().unwrap(),
            format!("orders.{}", format.extension())
        );
    }

    assert_eq!(read_output(&pipeline, "orders.csv"), "1,open\n2,closed");
    assert_eq!(read_output(&pipeline, "orders.txt"), "1\topen\n2\tclosed");
}

#[test]
fn test_compressing_twice_restores_same_container() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    let rows: String = (0..5000)
        .map(|i| format!("{}|customer_{}|{}", i, i % 40, i * 7))
        .collect::<Vec<_>>()
        .join("\n");
    write_input(&pipeline, "lineitem.tbl", &rows);

    let source = pipeline.config().input_dir.join("lineitem.tbl");
    let schema = infer_schema(&source, TextFormat::Tbl, 20).unwrap();
    let container = root.path().join("lineitem.parquet");
    let batches = parquet_zstd_archiver::RowBatchReader::from_path(&source, &schema, 1000).unwrap();
    parquet_zstd_archiver::convert_batches(batches, &container, TextFormat::Tbl).unwrap();

    let options = CodecOptions {
        level: 5,
        workers: 2,
        chunk_size: 8 * 1024,
    };
    let first = root.path().join("first.zstd");
    let second = root.path().join("second.zstd");
    compress_file(&container, &first, &options).unwrap();
    compress_file(&container, &second, &options).unwrap();

    let first_out = root.path().join("first.parquet");
    let second_out = root.path().join("second.parquet");
    decompress_file(&first, &first_out, 4096).unwrap();
    decompress_file(&second, &second_out, 4096).unwrap();

    let original = fs::read(&container).unwrap();
    assert_eq!(fs::read(&first_out).unwrap(), original);
    assert_eq!(fs::read(&second_out).unwrap(), original);
}

#[test]
fn test_batch_boundaries_keep_single_newlines() {
    let root = tempdir().unwrap();
    // 7 rows in batches of 3: groups of 3, 3 and 1
    let pipeline = test_pipeline(&root, 3, 1);
    let content = (1..=7)
        .map(|i| format!("{}|row{}", i, i))
        .collect::<Vec<_>>()
        .join("\n");
    write_input(&pipeline, "batched.tbl", &content);

    let outcome = pipeline
        .compress_file(&pipeline.config().input_dir.join("batched.tbl"))
        .unwrap();
    assert_eq!(outcome.rows, 7);

    let restored = pipeline.decompress_file(&outcome.archive).unwrap();
    assert_eq!(restored.rows, 7);
    let text = fs::read_to_string(&restored.output).unwrap();
    assert_eq!(text.matches('\n').count(), 6);
    assert_eq!(text, content);
}

#[test]
fn test_trailing_newline_is_canonicalised() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    write_input(&pipeline, "trailing.tbl", "a|b\r\nc|d\r\n\n");

    let mut stats = PipelineStats::new();
    pipeline.run(&mut stats).unwrap();
    assert_eq!(read_output(&pipeline, "trailing.tbl"), "a|b\nc|d");
}

#[test]
fn test_short_rows_are_null_filled() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    write_input(&pipeline, "ragged.tbl", "a|b|c\n1|2\n4|5|6\n7|8|9");

    let mut stats = PipelineStats::new();
    let (forward, reverse) = pipeline.run(&mut stats).unwrap();
    assert!(forward.is_clean());
    assert!(reverse.is_clean());
    assert_eq!(read_output(&pipeline, "ragged.tbl"), "a|b|c\n1|2|\n4|5|6\n7|8|9");
}

#[test]
fn test_comma_majority_overrides_pipe_default() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    write_input(&pipeline, "mixed.tbl", "a,b,c\n1,2,3\nx|y,z\n4,5,6");

    let source = pipeline.config().input_dir.join("mixed.tbl");
    let schema = infer_schema(&source, TextFormat::Tbl, 20).unwrap();
    assert_eq!(schema.separator, ',');
    assert_eq!(schema.column_count, 3);
    assert!(schema.overrides_default(TextFormat::Tbl));

    let outcome = pipeline.compress_file(&source).unwrap();
    assert_eq!(outcome.schema, schema);
    assert_eq!(outcome.rows, 4);

    // Export uses the separator of the recovered extension
    pipeline.decompress_file(&outcome.archive).unwrap();
    let text = read_output(&pipeline, "mixed.tbl");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "a|b|c");
    assert_eq!(lines[2], "\"x|y\"|z|");
}

#[test]
fn test_quoted_fields_survive_csv_round_trip() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    let content = "id,comment\n1,\"hello, world\"\n2,\"\"\"hi\"\" said\"\"\"\n3,plain";
    write_input(&pipeline, "quoted.csv", content);

    let mut stats = PipelineStats::new();
    pipeline.run(&mut stats).unwrap();
    assert_eq!(read_output(&pipeline, "quoted.csv"), content);
}

#[test]
fn test_mid_field_quotes_are_literal() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    let content = "1|5\"10 pipe|x\n2|ok|y\n3|say \"\"hi\"\"|z";
    write_input(&pipeline, "inches.tbl", content);

    let mut stats = PipelineStats::new();
    pipeline.run(&mut stats).unwrap();
    assert_eq!(read_output(&pipeline, "inches.tbl"), content);
}

#[test]
fn test_whitespace_only_lines_are_dropped() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    write_input(&pipeline, "ws.tbl", "1|2\n   \n3|4");

    let mut stats = PipelineStats::new();
    let (forward, _) = pipeline.run(&mut stats).unwrap();
    assert!(forward.is_clean());
    assert_eq!(read_output(&pipeline, "ws.tbl"), "1|2\n3|4");
}

#[test]
fn test_single_column_empty_value_survives() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 1000, 1);
    write_input(&pipeline, "single.csv", "a\n\"\"\nb");

    let outcome = pipeline
        .compress_file(&pipeline.config().input_dir.join("single.csv"))
        .unwrap();
    assert_eq!(outcome.rows, 3);

    let restored = pipeline.decompress_file(&outcome.archive).unwrap();
    assert_eq!(restored.rows, 3);
    let text = fs::read_to_string(&restored.output).unwrap();
    assert_eq!(text, "a\n\"\"\nb");

    // The restored file reads back with the same row count
    fs::write(pipeline.config().input_dir.join("single.csv"), &text).unwrap();
    let again = pipeline
        .compress_file(&pipeline.config().input_dir.join("single.csv"))
        .unwrap();
    assert_eq!(again.rows, 3);
}

#[test]
fn test_parallel_files_match_sequential_totals() {
    let root = tempdir().unwrap();
    let pipeline = test_pipeline(&root, 100, 3);
    for i in 0..6 {
        let rows = (0..250)
            .map(|r| format!("{}|{}|file{}", r, r * i, i))
            .collect::<Vec<_>>()
            .join("\n");
        write_input(&pipeline, &format!("part{}.tbl", i), &rows);
    }

    let mut stats = PipelineStats::new();
    let (forward, reverse) = pipeline.run(&mut stats).unwrap();
    assert_eq!(forward.succeeded.len(), 6);
    assert_eq!(reverse.succeeded.len(), 6);
    assert_eq!(stats.file_count, 6);
    assert_eq!(stats.restored_count, 6);

    let mut sorted = forward.succeeded.clone();
    sorted.sort();
    assert_eq!(forward.succeeded, sorted);

    for i in 0..6 {
        let name = format!("part{}.tbl", i);
        let original = fs::read_to_string(pipeline.config().input_dir.join(&name)).unwrap();
        assert_eq!(read_output(&pipeline, &name), original);
    }
}

#[test]
fn test_separate_work_dir() {
    let root = tempdir().unwrap();
    let work = root.path().join("work");
    let config = PipelineConfig::builder()
        .input_dir(root.path().join("data"))
        .compress_dir(root.path().join("compress"))
        .decompress_dir(root.path().join("decompress"))
        .work_dir(&work)
        .compression_level(1)
        .build()
        .unwrap();
    fs::create_dir_all(&config.input_dir).unwrap();
    fs::write(config.input_dir.join("w.txt"), "a\tb\nc\td").unwrap();
    let pipeline = Pipeline::new(config);

    let mut stats = PipelineStats::new();
    pipeline.run(&mut stats).unwrap();

    assert!(Path::new(&work).is_dir());
    assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
    assert_eq!(read_output(&pipeline, "w.txt"), "a\tb\nc\td");
}
