//! FBX import through a headless Blender.
//!
//! Blender converts the FBX to a GLB in a temporary directory, and the
//! result is read with [`GltfImporter`]. The conversion script is passed
//! inline with `--python-expr`, so no script file has to ship with the binary.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use animbatch_spec::{BlenderConfig, DEFAULT_BLENDER_TIMEOUT_SECS};
use log::{debug, info};

use super::{ClipImporter, GltfImporter, ImportedScene};
use crate::error::{RetargetError, RetargetResult};

/// Script run inside Blender. Arguments after `--` are `<source.fbx> <output.glb>`.
const CONVERT_FBX_PY: &str = r#"
import sys
import bpy

argv = sys.argv[sys.argv.index("--") + 1:]
src, dst = argv[0], argv[1]

bpy.ops.wm.read_factory_settings(use_empty=True)
bpy.ops.import_scene.fbx(
    filepath=src,
    automatic_bone_orientation=True,
    ignore_leaf_bones=True,
    anim_offset=0,
)
bpy.ops.export_scene.gltf(
    filepath=dst,
    export_format="GLB",
    export_animations=True,
    export_animation_mode="ACTIONS",
    export_skins=True,
    export_yup=True,
)
"#;

/// Bytes of Blender's stderr kept for error reports.
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// Runs Blender to convert FBX files to GLB.
#[derive(Debug, Clone)]
pub struct BlenderConverter {
    blender_path: Option<PathBuf>,
    timeout: Duration,
}

impl BlenderConverter {
    pub fn new() -> Self {
        Self {
            blender_path: None,
            timeout: Duration::from_secs(DEFAULT_BLENDER_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &BlenderConfig) -> Self {
        Self {
            blender_path: config.blender_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Overrides the Blender executable.
    pub fn blender_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.blender_path = Some(path.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Resolves the Blender executable for this converter.
    pub fn locate(&self) -> RetargetResult<PathBuf> {
        if let Some(path) = self.blender_path.as_ref().filter(|p| p.exists()) {
            return Ok(path.clone());
        }
        find_blender()
    }

    /// Converts `source` (FBX) to `output` (GLB).
    pub fn convert(&self, source: &Path, output: &Path) -> RetargetResult<()> {
        let blender = self.locate()?;
        info!("converting {} with {}", source.display(), blender.display());

        let mut cmd = Command::new(&blender);
        cmd.arg("--background")
            .arg("--factory-startup")
            .arg("--python-expr")
            .arg(CONVERT_FBX_PY)
            .arg("--")
            .arg(source)
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let child = cmd.spawn()?;
        let (status, stderr) = wait_with_timeout(child, self.timeout)?;
        if !status.success() {
            return Err(RetargetError::BlenderFailed {
                exit_code: status.code().unwrap_or(-1),
                stderr,
            });
        }
        if !output.exists() {
            return Err(RetargetError::import_failed(
                source,
                "Blender exited successfully but wrote no GLB",
            ));
        }
        Ok(())
    }
}

impl Default for BlenderConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds the Blender executable: `BLENDER_PATH`, then `PATH`, then common
/// install locations.
pub fn find_blender() -> RetargetResult<PathBuf> {
    if let Ok(path) = std::env::var("BLENDER_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }

    let names: &[&str] = if cfg!(windows) {
        &["blender.exe", "blender"]
    } else {
        &["blender"]
    };
    for name in names {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    let common_paths: &[&str] = if cfg!(windows) {
        &[
            "C:\\Program Files\\Blender Foundation\\Blender 4.2\\blender.exe",
            "C:\\Program Files\\Blender Foundation\\Blender 4.1\\blender.exe",
            "C:\\Program Files\\Blender Foundation\\Blender\\blender.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &["/Applications/Blender.app/Contents/MacOS/Blender"]
    } else {
        &["/usr/bin/blender", "/usr/local/bin/blender", "/snap/bin/blender"]
    };
    common_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or(RetargetError::BlenderNotFound)
}

fn wait_with_timeout(mut child: Child, timeout: Duration) -> RetargetResult<(ExitStatus, String)> {
    // Drained while the child runs; a full pipe would stall it.
    let reader = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = err.read_to_end(&mut bytes);
            bytes
        })
    });

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RetargetError::BlenderTimeout {
                timeout_secs: timeout.as_secs(),
            });
        }
        thread::sleep(Duration::from_millis(100));
    };

    let stderr = reader
        .and_then(|handle| handle.join().ok())
        .map(|bytes| stderr_tail(&bytes))
        .unwrap_or_default();
    Ok((status, stderr))
}

/// The last [`STDERR_TAIL_BYTES`] of Blender's output, where the error usually is.
fn stderr_tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

/// Imports `.fbx` files by converting them with Blender first.
#[derive(Debug, Clone)]
pub struct FbxImporter {
    converter: BlenderConverter,
    gltf: GltfImporter,
}

impl FbxImporter {
    pub fn new(converter: BlenderConverter, gltf: GltfImporter) -> Self {
        Self { converter, gltf }
    }
}

impl ClipImporter for FbxImporter {
    fn import(&self, path: &Path) -> RetargetResult<ImportedScene> {
        let temp_dir = tempfile::tempdir()?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("clip");
        let glb = temp_dir.path().join(format!("{}.glb", stem));
        self.converter.convert(path, &glb)?;
        debug!("converted {} -> {}", path.display(), glb.display());
        self.gltf.import(&glb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converter_builder() {
        let converter = BlenderConverter::new()
            .blender_path("/opt/blender/blender")
            .timeout_secs(42);
        assert_eq!(converter.blender_path, Some(PathBuf::from("/opt/blender/blender")));
        assert_eq!(converter.timeout, Duration::from_secs(42));
    }

    #[test]
    fn test_default_timeout_matches_config_default() {
        assert_eq!(BlenderConverter::new().timeout, Duration::from_secs(DEFAULT_BLENDER_TIMEOUT_SECS));
        assert_eq!(BlenderConfig::default().timeout_secs, DEFAULT_BLENDER_TIMEOUT_SECS);
    }

    #[test]
    fn test_converter_from_config() {
        let config = BlenderConfig {
            blender_path: Some(PathBuf::from("/usr/bin/blender")),
            timeout_secs: 10,
        };
        let converter = BlenderConverter::from_config(&config);
        assert_eq!(converter.timeout, Duration::from_secs(10));
        assert_eq!(converter.blender_path, config.blender_path);
    }

    #[test]
    fn test_convert_script_uses_import_options() {
        assert!(CONVERT_FBX_PY.contains("automatic_bone_orientation=True"));
        assert!(CONVERT_FBX_PY.contains("ignore_leaf_bones=True"));
        assert!(CONVERT_FBX_PY.contains("export_format=\"GLB\""));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_captures_stderr() {
        let child = Command::new("sh")
            .args(["-c", "echo broken 1>&2; exit 3"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let (status, stderr) = wait_with_timeout(child, Duration::from_secs(5)).unwrap();
        assert_eq!(status.code(), Some(3));
        assert!(stderr.contains("broken"));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_survives_stderr_flood() {
        let child = Command::new("sh")
            .args(["-c", "head -c 300000 /dev/zero | tr '\\0' x 1>&2; echo done 1>&2; exit 3"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let (status, stderr) = wait_with_timeout(child, Duration::from_secs(20)).unwrap();
        assert_eq!(status.code(), Some(3));
        assert_eq!(stderr.len(), STDERR_TAIL_BYTES);
        assert!(stderr.ends_with("done\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_convert_reports_exit_code_of_noisy_blender() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("blender");
        {
            let mut file = std::fs::File::create(&script).unwrap();
            file.write_all(b"#!/bin/sh\nhead -c 300000 /dev/zero | tr '\\0' x 1>&2\nexit 3\n")
                .unwrap();
            file.sync_all().unwrap();
        }
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let converter = BlenderConverter::new().blender_path(&script).timeout_secs(20);
        let err = converter
            .convert(&dir.path().join("clip.fbx"), &dir.path().join("clip.glb"))
            .unwrap_err();
        assert!(
            matches!(err, RetargetError::BlenderFailed { exit_code: 3, .. }),
            "{err}"
        );
    }

    #[test]
    fn test_stderr_tail_keeps_end() {
        let bytes = vec![b'a'; STDERR_TAIL_BYTES + 10];
        assert_eq!(stderr_tail(&bytes).len(), STDERR_TAIL_BYTES);
        assert_eq!(stderr_tail(b"short"), "short");
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_kills() {
        let child = Command::new("sh")
            .args(["-c", "sleep 5"])
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let err = wait_with_timeout(child, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, RetargetError::BlenderTimeout { .. }));
    }
}
