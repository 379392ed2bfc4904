use std::fs;
use std::thread;

use engine_logging::{LogLevel, LogStream, Logger};
use tempfile::TempDir;

#[test]
fn entries_land_in_combined_and_stream_files() {
    let temp = TempDir::new().unwrap();
    let logger = Logger::to_directory(temp.path(), LogLevel::Debug).unwrap();

    logger.info(LogStream::Application, "app", "started");
    logger.debug(LogStream::Compiler, "compiler", "This is pdfTeX");

    let combined = fs::read_to_string(temp.path().join("kiwitex.log")).unwrap();
    let application = fs::read_to_string(temp.path().join("application.log")).unwrap();
    let compiler = fs::read_to_string(temp.path().join("compiler.log")).unwrap();
    let orchestration = fs::read_to_string(temp.path().join("orchestration.log")).unwrap();

    assert_eq!(combined.lines().count(), 2);
    assert!(application.contains("| INFO | app | started"));
    assert!(!application.contains("pdfTeX"));
    assert!(compiler.contains("| DEBUG | compiler | This is pdfTeX"));
    assert!(orchestration.is_empty());
}

#[test]
fn reopening_appends_instead_of_truncating() {
    let temp = TempDir::new().unwrap();
    {
        let logger = Logger::to_directory(temp.path(), LogLevel::Info).unwrap();
        logger.info(LogStream::Application, "app", "first run");
    }
    let logger = Logger::to_directory(temp.path(), LogLevel::Info).unwrap();
    logger.info(LogStream::Application, "app", "second run");

    let application = fs::read_to_string(temp.path().join("application.log")).unwrap();
    let lines: Vec<_> = application.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("first run"));
    assert!(lines[1].ends_with("second run"));
}

#[test]
fn concurrent_writers_never_interleave_lines() {
    let temp = TempDir::new().unwrap();
    let logger = Logger::to_directory(temp.path(), LogLevel::Debug).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let logger = logger.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    logger.info(
                        LogStream::Orchestration,
                        "worker",
                        format!("worker {worker} line {i}"),
                    );
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let orchestration = fs::read_to_string(temp.path().join("orchestration.log")).unwrap();
    let lines: Vec<_> = orchestration.lines().collect();
    assert_eq!(lines.len(), 200);
    assert!(lines
        .iter()
        .all(|line| line.split(" | ").count() == 4 && line.contains("| worker | worker ")));
}
