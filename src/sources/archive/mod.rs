//! Archive unpacking through the host's archive tools.
//!
//! Each archive format is described by an [`ExtractorDescriptor`]: the tool
//! to run, the suffixes it handles and command templates for listing and
//! extracting. The [`ExtractorRegistry`] is filled at startup with whatever
//! tools the host actually has, and picks a descriptor for a file by its
//! suffix.
//!
//! Templates may reference `{run}`, `{source}`, `{dest}` and `{stem}`
//! (the archive file name without its matched suffix). They run through the
//! host shell because some formats pipe one archiver into another.

mod detect;
mod listing;

pub use detect::HostPlatform;
pub use listing::{parse_listing, ListFormat};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::util::config::Config;
use crate::util::fs::remove_path_if_exists;
use crate::util::process::{shell_quote, ProcessBuilder};

/// Errors from selecting, listing or running an extractor.
#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("no extractor for `{}` (suffix `{suffix}`)", archive.display())]
    ExtractorNotFound { archive: PathBuf, suffix: String },

    #[error("`{command}` failed on `{}`{}", archive.display(), status_suffix(*status))]
    ExtractionFailed {
        command: String,
        archive: PathBuf,
        status: Option<i32>,
        stderr: String,
    },

    #[error("archive `{}` is empty", archive.display())]
    EmptyArchive { archive: PathBuf },

    #[error("unpacking `{}` did not produce `{}`", archive.display(), target.display())]
    TargetMissing { archive: PathBuf, target: PathBuf },

    #[error("invalid extractor `{name}`: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    #[error("failed to access `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn status_suffix(status: Option<i32>) -> String {
    match status {
        Some(code) => format!(" (exit code {})", code),
        None => String::new(),
    }
}

/// How to list and extract one archive format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorDescriptor {
    pub name: String,
    /// Lower values are tried first.
    pub priority: i32,
    pub suffixes: Vec<String>,
    /// The archive tool, substituted for `{run}`.
    pub run: String,
    pub list_command: Option<String>,
    pub extract_command: String,
    pub list_format: ListFormat,
}

impl ExtractorDescriptor {
    /// Reject descriptors that could never run.
    pub fn validate(&self) -> Result<(), UnpackError> {
        let invalid = |reason: &str| UnpackError::InvalidDescriptor {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.run.trim().is_empty() {
            return Err(invalid("run command is not set"));
        }
        if self.extract_command.trim().is_empty() {
            return Err(invalid("extract command is empty"));
        }
        if self.suffixes.is_empty() || self.suffixes.iter().any(|s| s.is_empty()) {
            return Err(invalid("suffix list is empty"));
        }
        Ok(())
    }

    /// The suffix of `file_name` this descriptor handles, longest first.
    pub fn matched_suffix(&self, file_name: &str) -> Option<&str> {
        let mut suffixes: Vec<&str> = self.suffixes.iter().map(String::as_str).collect();
        suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));

        suffixes
            .into_iter()
            .find(|suffix| ends_with_ignore_case(file_name, suffix))
    }

    /// `file_name` with the matched suffix removed.
    pub fn stem<'a>(&self, file_name: &'a str) -> &'a str {
        match self.matched_suffix(file_name) {
            Some(suffix) => &file_name[..file_name.len() - suffix.len()],
            None => file_name,
        }
    }

    /// The shell command that extracts `source` into `dest`.
    pub fn extract_command_for(&self, source: &Path, dest: &Path) -> String {
        self.render(&self.extract_command, source, dest)
    }

    /// The shell command that lists `source`, if this format has one.
    pub fn list_command_for(&self, source: &Path) -> Option<String> {
        let dest = source.parent().unwrap_or_else(|| Path::new("."));
        self.list_command
            .as_ref()
            .map(|template| self.render(template, source, dest))
    }

    /// Substitute the placeholders of `template` in a single pass, so text
    /// coming from a substituted path is never expanded again.
    fn render(&self, template: &str, source: &Path, dest: &Path) -> String {
        let file_name = file_name_of(source);
        let value = |key: &str| match key {
            "run" => Some(shell_quote(&self.run)),
            "source" => Some(shell_quote(&source.display().to_string())),
            "dest" => Some(shell_quote(&dest.display().to_string())),
            "stem" => Some(shell_quote(self.stem(&file_name))),
            _ => None,
        };

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let placeholder = tail
                .find('}')
                .and_then(|close| value(&tail[1..close]).map(|v| (close, v)));
            match placeholder {
                Some((close, v)) => {
                    out.push_str(&v);
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    if name.len() < suffix.len() {
        return false;
    }
    let start = name.len() - suffix.len();
    name.is_char_boundary(start) && name[start..].eq_ignore_ascii_case(suffix)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extractor descriptors by name.
#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    extractors: BTreeMap<String, ExtractorDescriptor>,
}

impl ExtractorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the extractors for the archive tools found on this host.
    pub fn detect() -> Self {
        detect::detect_with(HostPlatform::current(), |tool| which::which(tool).ok())
    }

    /// Add a descriptor, replacing any with the same name.
    pub fn register(&mut self, descriptor: ExtractorDescriptor) -> Result<(), UnpackError> {
        descriptor.validate()?;
        tracing::debug!(
            "registered extractor {} ({}) for {}",
            descriptor.name,
            descriptor.run,
            descriptor.suffixes.join(" ")
        );
        self.extractors.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ExtractorDescriptor> {
        self.extractors.get(name)
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Descriptors in selection order: ascending priority, then name.
    pub fn iter(&self) -> impl Iterator<Item = &ExtractorDescriptor> {
        let mut ordered: Vec<&ExtractorDescriptor> = self.extractors.values().collect();
        // BTreeMap yields names in order; a stable sort keeps that within a priority
        ordered.sort_by_key(|d| d.priority);
        ordered.into_iter()
    }

    /// The first descriptor that handles `archive`'s suffix.
    pub fn select(&self, archive: &Path) -> Option<&ExtractorDescriptor> {
        let file_name = file_name_of(archive);
        self.iter().find(|d| d.matched_suffix(&file_name).is_some())
    }

    /// Like [`select`](Self::select), but a missing extractor is an error
    /// and logs how to proceed by hand.
    pub fn select_or_err(&self, archive: &Path) -> Result<&ExtractorDescriptor, UnpackError> {
        self.select(archive).ok_or_else(|| {
            let suffix = archive
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            tracing::error!(
                "berth cannot unpack `{}` automatically; extract it by hand so that it is usable from `{}`",
                archive.display(),
                archive
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| ".".to_string())
            );
            UnpackError::ExtractorNotFound {
                archive: archive.to_path_buf(),
                suffix,
            }
        })
    }
}

/// Knobs for running extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackOptions {
    /// Let the archive tool write to our stdout.
    pub show_output: bool,
    /// Refuse zero-byte archives instead of skipping them.
    pub stop_on_empty_file: bool,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        UnpackOptions {
            show_output: false,
            stop_on_empty_file: true,
        }
    }
}

impl UnpackOptions {
    pub fn from_config(config: &Config) -> Self {
        UnpackOptions {
            show_output: config.unpack.show_output(),
            stop_on_empty_file: config.unpack.stop_on_empty_file(),
        }
    }
}

/// What [`unpack_all`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackOutcome {
    /// The target already existed; nothing was run.
    AlreadyPresent,
    Extracted,
    /// The archive was empty and empty archives are not fatal.
    SkippedEmpty,
}

/// Run `descriptor`'s extract command on `source`, writing into `dest`.
pub fn extract(
    descriptor: &ExtractorDescriptor,
    source: &Path,
    dest: &Path,
    opts: &UnpackOptions,
) -> Result<(), UnpackError> {
    let command = descriptor.extract_command_for(source, dest);
    run_tool(&command, source, opts.show_output).map(|_| ())
}

/// List the entries of `source`.
pub fn list(descriptor: &ExtractorDescriptor, source: &Path) -> Result<Vec<String>, UnpackError> {
    let file_name = file_name_of(source);
    let stem = descriptor.stem(&file_name);

    match descriptor.list_command_for(source) {
        Some(command) => {
            let stdout = run_tool(&command, source, false)?;
            Ok(parse_listing(descriptor.list_format, &stdout, stem))
        }
        None => Ok(vec![stem.to_string()]),
    }
}

fn run_tool(command: &str, archive: &Path, show_output: bool) -> Result<String, UnpackError> {
    let failed = |status: Option<i32>, stderr: String| UnpackError::ExtractionFailed {
        command: command.to_string(),
        archive: archive.to_path_buf(),
        status,
        stderr,
    };

    let output = ProcessBuilder::shell(command)
        .inherit_stdout(show_output)
        .exec()
        .map_err(|e| failed(None, format!("{:#}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        tracing::debug!("{}", stderr);
        return Err(failed(output.status.code(), stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Unpack `archive` into `extract_dir` unless `target` already exists.
///
/// `target` is a path the unpacked archive is expected to produce. If the
/// extractor fails, anything it left at `target` is removed so a later run
/// does not mistake a partial tree for a finished one.
pub fn unpack_all(
    registry: &ExtractorRegistry,
    archive: &Path,
    target: &Path,
    extract_dir: &Path,
    opts: &UnpackOptions,
) -> Result<UnpackOutcome, UnpackError> {
    if target.exists() {
        tracing::debug!("{} already present, not unpacking", target.display());
        return Ok(UnpackOutcome::AlreadyPresent);
    }

    let descriptor = registry.select_or_err(archive)?;

    let size = fs::metadata(archive)
        .map_err(|source| UnpackError::Io {
            path: archive.to_path_buf(),
            source,
        })?
        .len();
    if size == 0 {
        if opts.stop_on_empty_file {
            return Err(UnpackError::EmptyArchive {
                archive: archive.to_path_buf(),
            });
        }
        tracing::warn!("skipping empty archive {}", archive.display());
        return Ok(UnpackOutcome::SkippedEmpty);
    }

    fs::create_dir_all(extract_dir).map_err(|source| UnpackError::Io {
        path: extract_dir.to_path_buf(),
        source,
    })?;

    tracing::info!(
        "unpacking {} with {} into {}",
        archive.display(),
        descriptor.name,
        extract_dir.display()
    );

    if let Err(err) = extract(descriptor, archive, extract_dir, opts) {
        tracing::error!(
            "failed to unpack `{}`; it may not have downloaded completely. \
             Delete it and run again, or download it by hand",
            archive.display()
        );
        if let Err(cleanup) = remove_path_if_exists(target) {
            tracing::warn!("{:#}", cleanup);
        }
        return Err(err);
    }

    if !target.exists() {
        return Err(UnpackError::TargetMissing {
            archive: archive.to_path_buf(),
            target: target.to_path_buf(),
        });
    }

    Ok(UnpackOutcome::Extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn descriptor(name: &str, priority: i32, suffixes: &[&str]) -> ExtractorDescriptor {
        ExtractorDescriptor {
            name: name.to_string(),
            priority,
            suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
            run: "tool".to_string(),
            list_command: None,
            extract_command: "{run} {source} {dest}".to_string(),
            list_format: ListFormat::Stem,
        }
    }

    fn posix_registry() -> ExtractorRegistry {
        detect::detect_with(HostPlatform::Posix, |tool| Some(PathBuf::from(tool)))
    }

    #[test]
    fn test_tar_gz_goes_to_targz_not_gzip() {
        let registry = posix_registry();

        assert_eq!(registry.select(Path::new("dl/zlib-1.2.8.tar.gz")).unwrap().name, "TARGZ");
        assert_eq!(registry.select(Path::new("SQLITE.TGZ")).unwrap().name, "TARGZ");
        assert_eq!(registry.select(Path::new("boost.tar.bz2")).unwrap().name, "TARBZ");
        assert_eq!(registry.select(Path::new("notes.txt.gz")).unwrap().name, "GZIP");
        assert_eq!(registry.select(Path::new("data.bzip")).unwrap().name, "BZIP");
        assert_eq!(registry.select(Path::new("gtest-1.7.0.zip")).unwrap().name, "ZIP");
        assert!(registry.select(Path::new("archive.rar")).is_none());
    }

    #[test]
    fn test_selection_order_is_priority_then_name() {
        let mut registry = ExtractorRegistry::new();
        registry.register(descriptor("ZETA", 1, &[".x"])).unwrap();
        registry.register(descriptor("ALPHA", 1, &[".x"])).unwrap();
        registry.register(descriptor("OMEGA", 2, &[".x"])).unwrap();

        assert_eq!(registry.select(Path::new("a.x")).unwrap().name, "ALPHA");

        registry.register(descriptor("LATE", 0, &[".x"])).unwrap();
        assert_eq!(registry.select(Path::new("a.x")).unwrap().name, "LATE");

        let names: Vec<&str> = registry.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["LATE", "ALPHA", "ZETA", "OMEGA"]);
    }

    #[test]
    fn test_stem_strips_longest_suffix() {
        let d = descriptor("TARGZ", 0, &[".gz", ".tar.gz"]);
        assert_eq!(d.matched_suffix("pkg.TAR.GZ"), Some(".tar.gz"));
        assert_eq!(d.stem("pkg.TAR.GZ"), "pkg");
        assert_eq!(d.stem("readme"), "readme");
    }

    #[test]
    fn test_render_quotes_paths() {
        let d = ExtractorDescriptor {
            extract_command: "{run} -dc {source} > {dest}/{stem}".to_string(),
            ..descriptor("GZIP", 1, &[".gz"])
        };
        let cmd = d.extract_command_for(Path::new("/tmp/my dl/notes.gz"), Path::new("/tmp/out"));
        if cfg!(windows) {
            assert!(cmd.contains("\"/tmp/my dl/notes.gz\""));
        } else {
            assert_eq!(cmd, "tool -dc '/tmp/my dl/notes.gz' > /tmp/out/notes");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_render_does_not_expand_placeholders_inside_paths() {
        let d = ExtractorDescriptor {
            extract_command: "{run} xf {source} -C {dest} {unknown}".to_string(),
            ..descriptor("TAR", 1, &[".tar"])
        };
        let cmd = d.extract_command_for(Path::new("/dl/odd{dest}{stem}.tar"), Path::new("/out"));
        assert_eq!(cmd, "tool xf '/dl/odd{dest}{stem}.tar' -C /out {unknown}");
    }

    #[cfg(windows)]
    #[test]
    fn test_extract_with_spaces_in_tool_and_paths() {
        let tmp = TempDir::new().unwrap();
        let tool_dir = tmp.path().join("tool dir");
        fs::create_dir_all(&tool_dir).unwrap();
        let tool = tool_dir.join("copy tool.bat");
        fs::write(&tool, "@copy /Y %1 %2 >NUL\r\n").unwrap();

        let source = tmp.path().join("my archive.tgz");
        fs::write(&source, b"payload").unwrap();
        let dest = tmp.path().join("out dir");
        fs::create_dir_all(&dest).unwrap();

        let d = ExtractorDescriptor {
            run: tool.display().to_string(),
            extract_command: "{run} {source} {dest}".to_string(),
            ..descriptor("COPY", 1, &[".tgz"])
        };
        extract(&d, &source, &dest, &UnpackOptions::default()).unwrap();

        assert_eq!(fs::read(dest.join("my archive.tgz")).unwrap(), b"payload");
    }

    #[test]
    fn test_invalid_descriptor_rejected() {
        let mut registry = ExtractorRegistry::new();
        let mut d = descriptor("EMPTY", 1, &[".e"]);
        d.run = String::new();
        let err = registry.register(d).unwrap_err();
        assert!(matches!(err, UnpackError::InvalidDescriptor { .. }));
        assert!(registry.is_empty());

        let err = registry.register(descriptor("NOSUFFIX", 1, &[])).unwrap_err();
        assert!(err.to_string().contains("suffix"));
    }

    #[test]
    fn test_unknown_suffix_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("source.rar");
        fs::write(&archive, b"rar").unwrap();

        let err = unpack_all(
            &posix_registry(),
            &archive,
            &tmp.path().join("source"),
            tmp.path(),
            &UnpackOptions::default(),
        )
        .unwrap_err();

        match err {
            UnpackError::ExtractorNotFound { suffix, .. } => assert_eq!(suffix, ".rar"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_existing_target_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("pkg");
        fs::create_dir(&target).unwrap();

        // the archive does not even exist; nothing may touch it
        let outcome = unpack_all(
            &posix_registry(),
            &tmp.path().join("pkg.tar.gz"),
            &target,
            tmp.path(),
            &UnpackOptions::default(),
        )
        .unwrap();
        assert_eq!(outcome, UnpackOutcome::AlreadyPresent);
    }

    #[test]
    fn test_empty_archive() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.tar.gz");
        fs::write(&archive, b"").unwrap();
        let target = tmp.path().join("pkg");

        let err = unpack_all(&posix_registry(), &archive, &target, tmp.path(), &UnpackOptions::default())
            .unwrap_err();
        assert!(matches!(err, UnpackError::EmptyArchive { .. }));

        let lenient = UnpackOptions {
            stop_on_empty_file: false,
            ..UnpackOptions::default()
        };
        let outcome = unpack_all(&posix_registry(), &archive, &target, tmp.path(), &lenient).unwrap();
        assert_eq!(outcome, UnpackOutcome::SkippedEmpty);
    }

    #[cfg(unix)]
    fn scripted(extract_command: &str) -> ExtractorRegistry {
        let mut registry = ExtractorRegistry::new();
        registry
            .register(ExtractorDescriptor {
                run: "sh".to_string(),
                extract_command: extract_command.to_string(),
                ..descriptor("FAKE", 0, &[".fake"])
            })
            .unwrap();
        registry
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_extraction_removes_partial_target() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.fake");
        fs::write(&archive, b"not empty").unwrap();
        let out = tmp.path().join("out");
        let target = out.join("pkg");

        let registry = scripted("mkdir -p {dest}/pkg && touch {dest}/pkg/half && exit 3");
        let err = unpack_all(&registry, &archive, &target, &out, &UnpackOptions::default()).unwrap_err();

        match err {
            UnpackError::ExtractionFailed { status, command, .. } => {
                assert_eq!(status, Some(3));
                assert!(command.contains("exit 3"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!target.exists());
        assert!(out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_success_without_target_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg.fake");
        fs::write(&archive, b"not empty").unwrap();

        let registry = scripted("true");
        let err = unpack_all(
            &registry,
            &archive,
            &tmp.path().join("pkg"),
            tmp.path(),
            &UnpackOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, UnpackError::TargetMissing { .. }));
    }

    fn write_fixture_tar_gz(path: &Path) {
        let file = fs::File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let contents = b"hello from the archive\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "pkg-1.0/README", &contents[..])
            .unwrap();

        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_unpack_real_tar_gz() {
        let registry = ExtractorRegistry::detect();
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("pkg-1.0.tar.gz");
        write_fixture_tar_gz(&archive);

        if registry.select(&archive).is_none() {
            eprintln!("skipping: no tar.gz extractor on this host");
            return;
        }

        let out = tmp.path().join("extern");
        let target = out.join("pkg-1.0");
        let opts = UnpackOptions::default();

        let outcome = unpack_all(&registry, &archive, &target, &out, &opts).unwrap();
        assert_eq!(outcome, UnpackOutcome::Extracted);
        assert_eq!(
            fs::read_to_string(target.join("README")).unwrap(),
            "hello from the archive\n"
        );

        let again = unpack_all(&registry, &archive, &target, &out, &opts).unwrap();
        assert_eq!(again, UnpackOutcome::AlreadyPresent);

        if cfg!(unix) {
            let entries = list(registry.select(&archive).unwrap(), &archive).unwrap();
            assert_eq!(entries, ["pkg-1.0/README"]);
        }
    }
}
