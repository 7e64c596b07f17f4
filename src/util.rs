//! Private utility module: file naming of the inputs and outputs.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Check whether the given path has a PAR header extension, in either case.
pub fn is_par_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .map(|e| e.eq_ignore_ascii_case("par"))
        .unwrap_or(false)
}

/// Convert a file path to a header file (.PAR) to the path of its
/// sample file (.REC), preserving the case of the extension.
pub fn to_rec_file<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("par") => path.with_extension("rec"),
        Some("Par") => path.with_extension("Rec"),
        _ => path.with_extension("REC"),
    }
}

/// The base path of every output produced for an input: the input file
/// name without its extension, placed in `output_dir` if one is given,
/// or next to the input otherwise.
pub fn output_base<P: AsRef<Path>>(input: P, output_dir: Option<&Path>) -> PathBuf {
    let input = input.as_ref();
    let stem = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    match output_dir {
        Some(dir) => dir.join(stem),
        None => input.with_file_name(stem),
    }
}

/// Append a suffix (such as `.nii.gz` or `.bvals`) to a base path.
pub fn with_suffix<P: AsRef<Path>>(base: P, suffix: &str) -> PathBuf {
    let mut name: OsString = base.as_ref().as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
