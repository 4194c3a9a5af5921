//! Per-host payload bundles.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use flate2::{Compression, write::GzEncoder};

use crate::{HOST_PAYLOAD_DIR, HostAddr, PAYLOAD_DIR, Plan, PlanError, PlanResult, host_payload_dir};

/// Archive of a host's payload, relative to the output directory.
pub fn host_archive_path(host: &HostAddr) -> PathBuf {
    Path::new(PAYLOAD_DIR).join(format!("{}.tar.gz", host.internal))
}

/// Bundle each host's payload under `root` into `payload/<internal>.tar.gz`.
///
/// Each archive holds the host's `scale-payload/` directory and is written under a temporary
/// name first, so a partial archive is never left in place. Returns the archive paths relative
/// to `root`, in host first-use order.
pub fn bundle_hosts(root: &Path, plan: &Plan) -> PlanResult<Vec<PathBuf>> {
    let mut archives = Vec::new();

    for host in plan.hosts() {
        let src = root.join(host_payload_dir(host));
        let rel = host_archive_path(host);
        let archive = root.join(&rel);
        let partial = archive.with_extension("gz.partial");

        write_archive(&src, &partial)
            .map_err(|e| PlanError::resource(format!("host {}", host.internal), &partial, e))?;
        std::fs::rename(&partial, &archive)
            .map_err(|e| PlanError::resource(format!("host {}", host.internal), &archive, e))?;

        tracing::debug!(host = %host.internal, archive = %archive.display(), "Bundled host payload");
        archives.push(rel);
    }

    tracing::info!(archives = archives.len(), "Host payloads bundled");
    Ok(archives)
}

fn write_archive(src: &Path, dest: &Path) -> std::io::Result<()> {
    let file = File::create(dest)?;
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    tar.append_dir_all(HOST_PAYLOAD_DIR, src)?;
    tar.into_inner()?.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempdir::TempDir;

    #[test]
    fn test_write_archive_contains_payload_dir() {
        let temp_dir = TempDir::new("scalenet-test").unwrap();
        let src = temp_dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("node_1.sh"), "cd /root && true").unwrap();

        let dest = temp_dir.path().join("bundle.tar.gz");
        write_archive(&src, &dest).unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
        let names: Vec<PathBuf> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().into_owned())
            .collect();
        assert!(names.contains(&PathBuf::from("scale-payload/node_1.sh")));
    }

    #[test]
    fn test_host_archive_path() {
        assert_eq!(
            host_archive_path(&HostAddr::new("10.0.0.1", "54.0.0.1")),
            PathBuf::from("payload/10.0.0.1.tar.gz")
        );
    }
}
