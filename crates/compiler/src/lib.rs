//! ALAN-2022 Compiler Library
//!
//! Provides single-pass compilation from `.alan` source to Jasmin assembly
//! and, through the external Jasmin assembler, to JVM class files.
//!
//! The pipeline has no intermediate representation: the recursive-descent
//! [`Parser`] pulls tokens from the [`scanner`], binds identifiers in the
//! two-level [`symbols`] table, and drives the [`codegen`] emitter inline as
//! productions are recognized. A successful parse yields the emitter, whose
//! `make_listing` serializes the whole compilation unit.
//!
//! ```rust,ignore
//! use alanc::compile_to_listing;
//!
//! let listing = compile_to_listing("source Hello begin put \"hi\" end")?;
//! assert!(listing.contains(".class public Hello"));
//! ```

pub mod codegen;
pub mod error;
pub mod parser;
pub mod scanner;
pub mod symbols;
pub mod token;
pub mod types;

pub use codegen::CodeGen;
pub use error::CompileError;
pub use parser::Parser;
pub use scanner::Scanner;
pub use symbols::SymbolTable;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Compilation settings supplied by the driver.
///
/// The library never reads the environment; the driver resolves the
/// assembler jar from `JASMIN_JAR` and passes it here.
#[derive(Debug, Default)]
pub struct CompilerConfig {
    /// Path to the Jasmin assembler jar. Required unless `listing_only`.
    pub jasmin_jar: Option<PathBuf>,
    /// Stop after writing the `.jasmin` listing.
    pub listing_only: bool,
    /// Directory the listing (and class file) are written to.
    pub output_dir: Option<PathBuf>,
}

/// Compile ALAN source text to a Jasmin assembly listing.
pub fn compile_to_listing(source: &str) -> Result<String, CompileError> {
    let code = Parser::new(source)?.parse()?;
    Ok(code.make_listing()?)
}

/// Compile a `.alan` source file: write `<Class>.jasmin` and, unless the
/// configuration says otherwise, run the external assembler over it.
///
/// Returns the path of the emitted listing.
pub fn compile_file(source_path: &Path, config: &CompilerConfig) -> Result<PathBuf, CompileError> {
    let source = fs::read_to_string(source_path).map_err(|e| {
        CompileError::system(format!("cannot open {}: {}", source_path.display(), e))
    })?;

    let code = Parser::new(&source)?.parse()?;
    let listing = code.make_listing()?;

    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let listing_path = output_dir.join(format!("{}.jasmin", code.class_name()));
    fs::write(&listing_path, &listing).map_err(|e| {
        CompileError::system(format!("cannot write {}: {}", listing_path.display(), e))
    })?;

    if !config.listing_only {
        let jar = config
            .jasmin_jar
            .as_deref()
            .ok_or_else(|| CompileError::system("JASMIN_JAR is not set"))?;
        assemble(jar, &listing_path, &output_dir)?;
    }

    Ok(listing_path)
}

/// Run `java -jar <jar> <listing>` and wait for it to finish. Any abnormal
/// termination is a fatal error.
fn assemble(jar: &Path, listing_path: &Path, output_dir: &Path) -> Result<(), CompileError> {
    let output = Command::new("java")
        .arg("-jar")
        .arg(jar)
        .arg("-d")
        .arg(output_dir)
        .arg(listing_path)
        .output()
        .map_err(|e| CompileError::system(format!("failed to run java: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(match output.status.code() {
            Some(code) => CompileError::system(format!(
                "assembler exited with status {}:\n{}",
                code, stderr
            )),
            None => CompileError::system(format!(
                "assembler terminated by signal:\n{}",
                stderr
            )),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_to_listing_round_trip() {
        let listing = compile_to_listing("source Empty begin relax end").unwrap();
        assert!(listing.contains(".class public Empty"));
        assert!(listing.contains(".method public static main([Ljava/lang/String;)V"));
    }

    #[test]
    fn test_compile_to_listing_reports_errors() {
        let err = compile_to_listing("source Bad begin integer x; x := end").unwrap_err();
        assert!(err.pos.is_some());
        assert!(err
            .message
            .contains("expected expression or array allocation"));
    }

    #[test]
    fn test_compile_file_writes_listing() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("prog.alan");
        fs::write(&source_path, "source Prog begin put 1 end").unwrap();

        let config = CompilerConfig {
            jasmin_jar: None,
            listing_only: true,
            output_dir: Some(dir.path().to_path_buf()),
        };
        let listing_path = compile_file(&source_path, &config).unwrap();

        // The listing is named after the source-declared class, not the file.
        assert_eq!(listing_path.file_name().unwrap(), "Prog.jasmin");
        let listing = fs::read_to_string(&listing_path).unwrap();
        assert!(listing.contains(".class public Prog"));
    }

    #[test]
    fn test_compile_file_requires_jar_when_assembling() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("prog.alan");
        fs::write(&source_path, "source Prog begin relax end").unwrap();

        let config = CompilerConfig {
            jasmin_jar: None,
            listing_only: false,
            output_dir: Some(dir.path().to_path_buf()),
        };
        let err = compile_file(&source_path, &config).unwrap_err();
        assert_eq!(err.message, "JASMIN_JAR is not set");
    }

    #[test]
    fn test_compile_file_missing_source() {
        let err = compile_file(Path::new("no-such-file.alan"), &CompilerConfig::default())
            .unwrap_err();
        assert!(err.message.starts_with("cannot open no-such-file.alan"));
        assert!(err.pos.is_none());
    }
}
