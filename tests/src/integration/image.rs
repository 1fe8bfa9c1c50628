//! # Image Contract
//!
//! The committed `Dockerfile` is checked the way `fanout-image check` checks
//! it, and its launch command is run the way `fanout-image launch` runs it.

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use fanout_image::{
        verify, Dockerfile, ImageSpec, Instruction, LaunchError, Launcher, Lifecycle,
    };

    fn repository_dockerfile() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("Dockerfile")
    }

    fn load(path: &Path) -> Dockerfile {
        Dockerfile::parse(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_repository_dockerfile_satisfies_contract() {
        let report = verify(&load(&repository_dockerfile())).unwrap();

        assert_eq!(report.port, 8080);
        assert_eq!(report.launch, vec!["/app/fanout-gateway"]);
        assert!(report.workdir.starts_with('/'));
    }

    #[test]
    fn test_dependencies_install_before_source_copy() {
        let dockerfile = load(&repository_dockerfile());
        let build = &dockerfile.stages[0];

        let source_copy = build
            .instructions
            .iter()
            .position(|l| l.instruction.is_full_tree_copy())
            .unwrap();
        let fetch = build
            .instructions
            .iter()
            .position(|l| match &l.instruction {
                Instruction::Run(cmd) => cmd.starts_with("cargo fetch"),
                _ => false,
            })
            .unwrap();
        assert!(fetch < source_copy);
    }

    #[test]
    fn test_every_workspace_manifest_is_copied_for_install() {
        let spec = ImageSpec::default();
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..");

        for manifest in &spec.builder.manifests {
            assert!(root.join(manifest).is_file(), "missing {}", manifest);
        }
        for stub in &spec.builder.stub_sources {
            assert!(root.join(stub).is_file(), "stub for missing source {}", stub);
        }
    }

    #[test]
    fn test_rendered_file_checks_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");

        let mut spec = ImageSpec::default();
        spec.runtime.port = 9000;
        std::fs::write(&path, spec.render()).unwrap();

        assert_eq!(verify(&load(&path)).unwrap().port, 9000);
    }

    #[test]
    fn test_missing_entry_surfaces_at_launch() {
        let report = verify(&load(&repository_dockerfile())).unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let mut launcher = Launcher::new(report.launch).with_workdir(scratch.path());
        launcher.build().unwrap();
        assert_eq!(launcher.state(), Lifecycle::Built);

        if Path::new("/app/fanout-gateway").exists() {
            // Running inside the image itself
            return;
        }
        assert!(matches!(
            launcher.run(),
            Err(LaunchError::EntryNotFound { .. })
        ));
    }
}
