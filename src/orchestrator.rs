//! Turning path arguments into compile, write and run operations.

use crate::console::Console;
use crate::translate::{BOOTSTRAP_FILE, COMPILED_EXT, Mode, SOURCE_EXT, TranslateError};
use anyhow::Context;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What the orchestrator needs from the rest of the program.
pub trait Backend {
    fn translate(&mut self, code: &str, mode: Mode) -> Result<String, TranslateError>;

    /// Runtime header written into every module directory.
    fn header(&mut self) -> Result<String, TranslateError>;

    /// Run compiled code in the shared session.
    fn execute(&mut self, compiled: &str);

    fn console(&mut self) -> &mut Console;
}

/// Source file and where its compiled form goes (`None`: not written).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolution {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
}

impl PathResolution {
    pub fn resolve(path: &Path, write: bool) -> Self {
        Self {
            source: path.to_path_buf(),
            destination: write.then(|| path.with_extension(COMPILED_EXT)),
        }
    }
}

/// One file to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationTask {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub run: bool,
    pub module: bool,
}

/// A directory of a module tree and the source files directly inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDir {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Entries of one directory, sorted by path, each flagged when it is a
/// directory (symlinks to directories are not).
type Listing = io::Result<Vec<(PathBuf, bool)>>;

fn list_dir(dir: &Path) -> Listing {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        entries.push((entry.path(), entry.file_type()?.is_dir()));
    }
    entries.sort();
    Ok(entries)
}

/// Every directory under `root` (including it), each with its source files.
///
/// Entries are visited in name order; symlinked directories are not followed.
/// A directory that cannot be listed yields an error in its place and the
/// walk carries on with the rest.
pub fn module_tree(root: &Path) -> Vec<anyhow::Result<ModuleDir>> {
    walk(root, list_dir)
}

fn walk(root: &Path, mut list: impl FnMut(&Path) -> Listing) -> Vec<anyhow::Result<ModuleDir>> {
    let mut out = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match list(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                let err = anyhow::Error::new(err)
                    .context(format!("failed to read directory {}", dir.display()));
                out.push(Err(err));
                continue;
            }
        };

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for (path, is_dir) in entries {
            if is_dir {
                subdirs.push(path);
            } else if is_source(&path) {
                files.push(path);
            }
        }
        // Reversed so the stack pops them in name order.
        pending.extend(subdirs.into_iter().rev());
        out.push(Ok(ModuleDir { dir, files }));
    }
    out
}

fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXT)
}

/// Compilation settings shared by every path argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct Orchestrator {
    pub write: bool,
    pub run: bool,
}

impl Orchestrator {
    pub fn new(write: bool, run: bool) -> Self {
        Self { write, run }
    }

    /// Compile a file or a module directory. Problems are reported, not returned.
    pub fn compile_path(&self, backend: &mut impl Backend, path: &Path) {
        if path.is_file() {
            self.compile_file(backend, path, false);
        } else if path.is_dir() {
            self.compile_module(backend, path);
        } else {
            backend
                .console()
                .error(format!("Could not find path '{}'", path.display()));
        }
    }

    pub fn compile_module(&self, backend: &mut impl Backend, root: &Path) {
        let tree = module_tree(root);
        tracing::debug!(root = %root.display(), dirs = tree.len(), "compiling module");
        self.compile_tree(backend, tree);
    }

    /// Bootstrap and compile each listed directory; unlisted ones are reported.
    fn compile_tree(&self, backend: &mut impl Backend, tree: Vec<anyhow::Result<ModuleDir>>) {
        for module in tree {
            let module = match module {
                Ok(module) => module,
                Err(err) => {
                    backend.console().error(format!("{err:#}"));
                    continue;
                }
            };
            if let Err(err) = setup_module(backend, &module.dir) {
                backend.console().error(format!("{err:#}"));
            }
            for file in &module.files {
                self.compile_file(backend, file, true);
            }
        }
    }

    pub fn compile_file(&self, backend: &mut impl Backend, path: &Path, module: bool) {
        let PathResolution {
            source,
            destination,
        } = PathResolution::resolve(path, self.write);
        let task = CompilationTask {
            source,
            destination,
            run: self.run,
            module,
        };
        if let Err(err) = compile(backend, &task) {
            backend.console().error(format!("{err:#}"));
        }
    }
}

/// Translate, write and optionally run one file.
pub fn compile(backend: &mut impl Backend, task: &CompilationTask) -> anyhow::Result<()> {
    backend
        .console()
        .info(format!("Compiling '{}'...", task.source.display()));
    let code = fs::read_to_string(&task.source)
        .with_context(|| format!("failed to read {}", task.source.display()))?;

    let mode = if task.module { Mode::Module } else { Mode::File };
    let compiled = backend
        .translate(&code, mode)
        .with_context(|| format!("failed to compile {}", task.source.display()))?;

    if let Some(destination) = &task.destination {
        fs::write(destination, &compiled)
            .with_context(|| format!("failed to write {}", destination.display()))?;
        backend
            .console()
            .info(format!("Compiled '{}'.", destination.display()));
    }
    if task.run {
        backend.execute(&compiled);
    }
    Ok(())
}

/// (Re)write the bootstrap file of a module directory.
pub fn setup_module(backend: &mut impl Backend, dir: &Path) -> anyhow::Result<()> {
    let header = backend.header()?;
    let path = dir.join(BOOTSTRAP_FILE);
    fs::write(&path, header).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::trace!(path = %path.display(), "bootstrap written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::{Captured, captured_text};

    /// Backend counting every operation; sources containing `!` fail.
    struct Recorder {
        console: Console,
        translated: Vec<(String, Mode)>,
        executed: Vec<String>,
        headers: usize,
    }

    impl Recorder {
        fn new() -> (Self, Captured, Captured) {
            let (console, out, err) = Console::captured();
            let recorder = Self {
                console,
                translated: Vec::new(),
                executed: Vec::new(),
                headers: 0,
            };
            (recorder, out, err)
        }
    }

    impl Backend for Recorder {
        fn translate(&mut self, code: &str, mode: Mode) -> Result<String, TranslateError> {
            self.translated.push((code.to_string(), mode));
            if code.contains('!') {
                return Err(TranslateError::Invalid("bang".into()));
            }
            Ok(format!("compiled {code}"))
        }

        fn header(&mut self) -> Result<String, TranslateError> {
            self.headers += 1;
            Ok("RUNTIME".into())
        }

        fn execute(&mut self, compiled: &str) {
            self.executed.push(compiled.to_string());
        }

        fn console(&mut self) -> &mut Console {
            &mut self.console
        }
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_resolution_swaps_extension() {
        let r = PathResolution::resolve(Path::new("dir/prog.hsk"), true);
        assert_eq!(r.source, PathBuf::from("dir/prog.hsk"));
        assert_eq!(r.destination, Some(PathBuf::from("dir/prog.sh")));

        let r = PathResolution::resolve(Path::new("prog.hsk"), false);
        assert_eq!(r.destination, None);
    }

    #[test]
    fn test_single_file_is_compiled_written_and_run() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.hsk");
        write(&src, "x=1");
        let (mut backend, out, err) = Recorder::new();

        Orchestrator::new(true, true).compile_path(&mut backend, &src);

        assert_eq!(backend.translated, vec![("x=1".to_string(), Mode::File)]);
        assert_eq!(fs::read_to_string(dir.path().join("main.sh")).unwrap(), "compiled x=1");
        assert_eq!(backend.executed, vec!["compiled x=1".to_string()]);
        assert_eq!(captured_text(&out).lines().count(), 2);
        assert!(captured_text(&err).is_empty());
    }

    #[test]
    fn test_nowrite_only_runs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.hsk");
        write(&src, "x=1");
        let (mut backend, _, _) = Recorder::new();

        Orchestrator::new(false, true).compile_path(&mut backend, &src);

        assert!(!dir.path().join("main.sh").exists());
        assert_eq!(backend.executed.len(), 1);
    }

    #[test]
    fn test_module_walk_visits_every_directory_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pkg");
        write(&root.join("a.hsk"), "a");
        write(&root.join("notes.txt"), "ignored");
        write(&root.join("sub/b.hsk"), "b");
        write(&root.join("sub/c.hsk"), "c");
        write(&root.join("sub/deeper/d.hsk"), "d");
        fs::create_dir_all(root.join("empty")).unwrap();
        let (mut backend, _, err) = Recorder::new();

        Orchestrator::new(true, false).compile_path(&mut backend, &root);

        // N = 4 sources, M = 4 directories (pkg, empty, sub, sub/deeper).
        assert_eq!(backend.translated.len(), 4);
        assert!(backend.translated.iter().all(|(_, mode)| *mode == Mode::Module));
        assert_eq!(backend.headers, 4);
        for d in ["", "empty", "sub", "sub/deeper"] {
            let bootstrap = root.join(d).join(BOOTSTRAP_FILE);
            assert_eq!(fs::read_to_string(bootstrap).unwrap(), "RUNTIME");
        }
        assert!(root.join("sub/deeper/d.sh").exists());
        assert!(!root.join("notes.sh").exists());
        assert!(backend.executed.is_empty());
        assert!(captured_text(&err).is_empty());
    }

    #[test]
    fn test_bootstrap_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(BOOTSTRAP_FILE), "stale");
        let (mut backend, _, _) = Recorder::new();

        Orchestrator::new(true, false).compile_module(&mut backend, dir.path());

        assert_eq!(
            fs::read_to_string(dir.path().join(BOOTSTRAP_FILE)).unwrap(),
            "RUNTIME"
        );
    }

    #[test]
    fn test_missing_path_and_failed_file_do_not_stop_processing() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.hsk");
        let bad = dir.path().join("bad.hsk");
        write(&good, "ok");
        write(&bad, "oops!");
        let (mut backend, _, err) = Recorder::new();
        let orchestrator = Orchestrator::new(true, false);

        for path in [bad.clone(), dir.path().join("missing_path"), good.clone()] {
            orchestrator.compile_path(&mut backend, &path);
        }

        let errors = captured_text(&err);
        assert_eq!(errors.lines().count(), 2, "{errors}");
        assert!(errors.contains("Could not find path"));
        assert!(errors.contains("bad.hsk"));
        assert!(dir.path().join("good.sh").exists());
        assert!(!dir.path().join("bad.sh").exists());
    }

    #[test]
    fn test_module_tree_batches() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("b/x.hsk"), "");
        write(&dir.path().join("a/y.hsk"), "");
        write(&dir.path().join("z.hsk"), "");

        let tree: Vec<ModuleDir> = module_tree(dir.path())
            .into_iter()
            .collect::<anyhow::Result<_>>()
            .unwrap();

        let dirs: Vec<_> = tree.iter().map(|m| m.dir.clone()).collect();
        assert_eq!(
            dirs,
            vec![
                dir.path().to_path_buf(),
                dir.path().join("a"),
                dir.path().join("b")
            ]
        );
        assert_eq!(tree[0].files, vec![dir.path().join("z.hsk")]);
        assert_eq!(tree[1].files, vec![dir.path().join("a/y.hsk")]);
    }

    #[test]
    fn test_unlistable_directory_does_not_hide_its_siblings() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a/x.hsk"), "");
        write(&dir.path().join("locked/y.hsk"), "");
        write(&dir.path().join("z/w.hsk"), "");
        let locked = dir.path().join("locked");

        let tree = walk(dir.path(), |d| {
            if d == locked.as_path() {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            } else {
                list_dir(d)
            }
        });

        assert_eq!(tree.len(), 4);
        assert!(tree[2].as_ref().unwrap_err().to_string().contains("locked"));
        let listed: Vec<_> = tree.iter().filter_map(|m| m.as_ref().ok()).collect();
        assert_eq!(listed[1].files, vec![dir.path().join("a/x.hsk")]);
        assert_eq!(listed[2].files, vec![dir.path().join("z/w.hsk")]);
    }

    #[test]
    fn test_module_compile_reports_unlistable_directory_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.hsk"), "a");
        write(&dir.path().join("sub/b.hsk"), "b");
        let tree = vec![
            Ok(ModuleDir {
                dir: dir.path().to_path_buf(),
                files: vec![dir.path().join("a.hsk")],
            }),
            Err(anyhow::anyhow!("failed to read directory locked")),
            Ok(ModuleDir {
                dir: dir.path().join("sub"),
                files: vec![dir.path().join("sub/b.hsk")],
            }),
        ];
        let (mut backend, _, err) = Recorder::new();

        Orchestrator::new(true, false).compile_tree(&mut backend, tree);

        assert_eq!(captured_text(&err), "[husk] Error: failed to read directory locked\n");
        assert_eq!(backend.headers, 2);
        assert!(dir.path().join(BOOTSTRAP_FILE).exists());
        assert!(dir.path().join("a.sh").exists());
        assert!(dir.path().join("sub/b.sh").exists());
    }

    #[test]
    fn test_missing_module_root_is_one_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut backend, _, err) = Recorder::new();

        Orchestrator::new(true, false).compile_module(&mut backend, &dir.path().join("gone"));

        assert_eq!(captured_text(&err).lines().count(), 1);
        assert_eq!(backend.headers, 0);
    }
}
