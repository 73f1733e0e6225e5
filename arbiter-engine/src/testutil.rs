//! Shell-script stub engines for tests

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use arbiter_core::{EngineConfig, ProtocolKind};

use crate::factory::create_engine;
use crate::worker::EngineWorker;

static STUB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write an executable stub script to a temp location
pub(crate) fn write_stub(name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let dir = std::env::temp_dir().join("arbiter-stub-engines");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!(
        "{name}-{}-{}",
        std::process::id(),
        STUB_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Handshake-protocol engine that completes its feature section
pub(crate) fn handshake_stub() -> PathBuf {
    write_stub(
        "handshake",
        "#!/bin/sh\necho \"feature ping=1 setboard=1 done=1\"\ncat > /dev/null\n",
    )
}

/// Handshake-protocol engine that never sends done=1
pub(crate) fn slow_handshake_stub() -> PathBuf {
    write_stub(
        "slow-handshake",
        "#!/bin/sh\necho \"feature ping=1\"\ncat > /dev/null\n",
    )
}

/// Stream-protocol engine that completes its handshake
pub(crate) fn stream_stub() -> PathBuf {
    write_stub(
        "stream",
        "#!/bin/sh\necho \"id name Stub Stream 1.0\"\necho \"id author Stub\"\necho \"uciok\"\ncat > /dev/null\n",
    )
}

/// Stream-protocol engine that exits immediately
pub(crate) fn dying_stub() -> PathBuf {
    write_stub("dying", "#!/bin/sh\nexit 1\n")
}

/// Engine that streams banner lines forever without completing any
/// handshake
pub(crate) fn chatty_stub() -> PathBuf {
    write_stub(
        "chatty",
        "#!/bin/sh\nwhile true; do echo \"warming up tablebases\"; sleep 0.01; done\n",
    )
}

/// Worker over a stub script
pub(crate) fn stub_worker(path: &std::path::Path, protocol: ProtocolKind) -> EngineWorker {
    let config = EngineConfig::new("stub", path).with_protocol(protocol);
    create_engine(&config).unwrap()
}
