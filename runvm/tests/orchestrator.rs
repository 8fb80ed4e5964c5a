//! Integration tests for VM provisioning and lifecycle control.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeToolRunner, MemoryHypervisor, golden_image};
use runvm::runtime::mount_label;
use runvm::{
    ContainerRequest, MountSpec, NetworkResolver, ResolvedConfig, RunvmError, VmOrchestrator,
    VmState,
};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

// ============================================================================
// TEST FIXTURES
// ============================================================================

struct TestContext {
    orchestrator: VmOrchestrator,
    hypervisor: MemoryHypervisor,
    runner: Arc<FakeToolRunner>,
    run_dir: PathBuf,
    rootfs: PathBuf,
    _temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with(FakeToolRunner::new(), MemoryHypervisor::new(), |_| {})
    }

    fn with(
        runner: FakeToolRunner,
        hypervisor: MemoryHypervisor,
        adjust: impl FnOnce(&mut ResolvedConfig),
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let run_dir = temp_dir.path().join("run");
        let rootfs = temp_dir.path().join("rootfs");
        std::fs::create_dir_all(&rootfs).unwrap();
        let (golden, sha1) = golden_image(temp_dir.path());

        let mut config = ResolvedConfig {
            golden_image: golden,
            sha1_sum: Some(sha1),
            run_dir: run_dir.clone(),
            ..Default::default()
        };
        adjust(&mut config);

        let runner = Arc::new(runner);
        let resolver =
            NetworkResolver::with_helper(runner.clone(), PathBuf::from("/opt/runvm/netinfo.sh"));
        let orchestrator =
            VmOrchestrator::new(config, Arc::new(hypervisor.clone()), runner.clone())
                .with_resolver(resolver)
                .with_dial_timeout(Duration::from_millis(200));

        Self {
            orchestrator,
            hypervisor,
            runner,
            run_dir,
            rootfs,
            _temp_dir: temp_dir,
        }
    }

    fn request(&self, id: &str) -> ContainerRequest {
        ContainerRequest {
            id: id.into(),
            rootfs: self.rootfs.clone(),
            network_ns_path: format!("/var/run/netns/{id}"),
            args: vec!["echo".into(), "hello world".into()],
            env: vec!["PATH=/usr/bin:/bin".into()],
            cwd: "/".into(),
            resolv_conf: b"nameserver 10.0.0.1\n".to_vec(),
            hosts: b"127.0.0.1 localhost\n".to_vec(),
            ..Default::default()
        }
    }

    fn instance_dir(&self, id: &str) -> PathBuf {
        self.run_dir.join(id)
    }
}

// ============================================================================
// PROVISIONING
// ============================================================================

#[test]
fn provision_then_kill_removes_domain() {
    let ctx = TestContext::new();

    let vm = ctx.orchestrator.provision(ctx.request("c1")).unwrap();
    assert_eq!(vm.id(), "c1");
    assert_eq!(vm.state().unwrap(), VmState::Running);

    let dir = ctx.instance_dir("c1");
    let xml = ctx.hypervisor.domain("c1").unwrap().xml;
    assert!(xml.contains("<name>c1</name>"));
    assert!(xml.contains(&format!("<source file=\"{}\"/>", dir.join("disk.img").display())));
    assert!(xml.contains(&format!("<source file=\"{}\"/>", dir.join("seed.img").display())));
    assert!(xml.contains("<mac address=\"aa:bb:cc:dd:ee:ff\"/>"));
    assert!(xml.contains("<source dev=\"br0\" mode=\"passthrough\"/>"));

    assert!(ctx.orchestrator.lookup("c1").is_ok());
    ctx.orchestrator.kill("c1").unwrap();

    let err = ctx.orchestrator.lookup("c1").err().unwrap();
    assert!(err.is_not_found());
    assert!(!dir.exists());
}

#[test]
fn provision_runs_tools_in_order_inside_instance_dir() {
    let ctx = TestContext::new();
    ctx.orchestrator.provision(ctx.request("c1")).unwrap();

    assert_eq!(ctx.runner.tools_run(), vec!["netinfo.sh", "qemu-img", "genisoimage"]);

    let dir = ctx.instance_dir("c1");
    let calls = ctx.runner.calls();
    assert_eq!(calls[0].args, vec!["/var/run/netns/c1".to_string()]);
    assert_eq!(calls[1].cwd.as_deref(), Some(dir.as_path()));
    assert_eq!(calls[2].cwd.as_deref(), Some(dir.as_path()));

    for name in [
        "disk.img",
        "seed.img",
        "user-data",
        "meta-data",
        "systemd-data",
        "execute.sh",
        "resolv.conf",
        "hosts",
    ] {
        assert!(dir.join(name).exists(), "{name} missing");
    }

    let meta = std::fs::read_to_string(dir.join("meta-data")).unwrap();
    assert!(meta.contains("address 10.0.0.5"));
    let launcher = std::fs::read_to_string(dir.join("execute.sh")).unwrap();
    assert!(launcher.contains("export PATH=/usr/bin:/bin"));
    assert!(launcher.contains("exec echo 'hello world' > /dev/hvc1 2>&1"));
}

#[test]
fn mount_label_matches_between_seed_and_domain() {
    let ctx = TestContext::new();
    let data = ctx._temp_dir.path().join("data");
    std::fs::create_dir(&data).unwrap();

    let mut request = ctx.request("c1");
    request.mounts.push(MountSpec {
        source: data.clone(),
        destination: "/data".into(),
    });
    ctx.orchestrator.provision(request).unwrap();

    let label = mount_label("/data");
    let user_data = std::fs::read_to_string(ctx.instance_dir("c1").join("user-data")).unwrap();
    assert!(user_data.contains(&format!("mount -t 9p -o trans=virtio {label} /mnt/data")));

    let xml = ctx.hypervisor.domain("c1").unwrap().xml;
    let entry = format!(
        "<source dir=\"{}\"/>\n      <target dir=\"{label}\"/>",
        data.display()
    );
    assert!(xml.contains(&entry), "no filesystem entry for {label} in\n{xml}");
}

#[test]
fn every_guest_mount_tag_is_defined_by_the_domain() {
    let ctx = TestContext::new();
    let base = ctx._temp_dir.path();
    let conf = base.join("conf");
    let data = base.join("data");
    std::fs::create_dir(&conf).unwrap();
    std::fs::create_dir(&data).unwrap();
    for file in [conf.join("a.conf"), conf.join("b.conf"), data.join("seed.db")] {
        std::fs::write(&file, "x").unwrap();
    }

    let mut request = ctx.request("c1");
    for (source, destination) in [
        (conf.join("a.conf"), "/etc/a.conf"),
        (conf.join("b.conf"), "/etc/b.conf"),
        (data.clone(), "/data"),
        (data.join("seed.db"), "/var/lib/seed.db"),
    ] {
        request.mounts.push(MountSpec {
            source,
            destination: destination.into(),
        });
    }
    ctx.orchestrator.provision(request).unwrap();

    let user_data = std::fs::read_to_string(ctx.instance_dir("c1").join("user-data")).unwrap();
    let xml = ctx.hypervisor.domain("c1").unwrap().xml;

    let tags: Vec<&str> = user_data
        .lines()
        .filter_map(|line| line.split("mount -t 9p -o trans=virtio ").nth(1))
        .filter_map(|rest| rest.split_whitespace().next())
        .collect();
    // rootfs, the data directory and the staged conf directory
    assert_eq!(tags.len(), 3, "{user_data}");
    for tag in &tags {
        assert!(
            xml.contains(&format!("<target dir=\"{tag}\"/>")),
            "guest mounts tag {tag} that the domain does not define:\n{xml}"
        );
    }
    assert_eq!(xml.matches("<filesystem").count(), tags.len());

    for destination in ["/etc/a.conf", "/etc/b.conf", "/var/lib/seed.db"] {
        assert!(
            user_data.contains(&format!("/mnt{destination}\n")),
            "no bind for {destination}"
        );
    }
    assert!(user_data.contains("mount --bind /mnt/data/seed.db /mnt/var/lib/seed.db"));
}

#[test]
fn user_data_without_mounts_has_no_blank_lines() {
    let ctx = TestContext::new();
    ctx.orchestrator.provision(ctx.request("c1")).unwrap();

    let user_data = std::fs::read_to_string(ctx.instance_dir("c1").join("user-data")).unwrap();
    assert!(user_data.starts_with("#cloud-config\n"));
    assert!(!user_data.contains("\n\n"));
    assert!(user_data.contains("mount -t 9p -o trans=virtio share_dir /mnt"));
}

// ============================================================================
// FAILURE STAGES
// ============================================================================

#[test]
fn integrity_mismatch_blocks_vm_creation() {
    let ctx = TestContext::with(FakeToolRunner::new(), MemoryHypervisor::new(), |config| {
        config.sha1_sum = Some("0000000000000000000000000000000000000000".into());
    });

    let err = ctx.orchestrator.provision(ctx.request("c1")).err().unwrap();
    assert!(matches!(err, RunvmError::Integrity { .. }));
    assert_eq!(ctx.runner.tools_run(), vec!["netinfo.sh"]);
    assert_eq!(ctx.hypervisor.domain_count(), 0);
}

#[test]
fn missing_iso_tool_aborts_before_hypervisor() {
    let ctx = TestContext::with(
        FakeToolRunner::new().missing("genisoimage"),
        MemoryHypervisor::new(),
        |_| {},
    );

    let err = ctx.orchestrator.provision(ctx.request("c1")).err().unwrap();
    assert!(matches!(err, RunvmError::ToolNotFound { ref tool } if tool == "genisoimage"));
    assert_eq!(ctx.hypervisor.domain_count(), 0);
    // Partial artifacts stay for postmortem
    assert!(ctx.instance_dir("c1").join("disk.img").exists());
}

#[test]
fn network_failure_is_fatal() {
    let ctx = TestContext::with(
        FakeToolRunner::new().failing("netinfo.sh", "cannot enter namespace"),
        MemoryHypervisor::new(),
        |_| {},
    );

    let err = ctx.orchestrator.provision(ctx.request("c1")).err().unwrap();
    assert_eq!(err.stage(), "network");
    assert!(!ctx.instance_dir("c1").exists());
}

#[test]
fn disk_tool_failure_is_delta_disk_stage() {
    let ctx = TestContext::with(
        FakeToolRunner::new().failing("qemu-img", "Could not open backing file"),
        MemoryHypervisor::new(),
        |_| {},
    );

    let err = ctx.orchestrator.provision(ctx.request("c1")).err().unwrap();
    assert!(matches!(err, RunvmError::DiskCreate(ref m) if m.contains("backing file")));
}

#[test]
fn start_failure_leaves_domain_for_kill() {
    let ctx = TestContext::with(FakeToolRunner::new(), MemoryHypervisor::failing_start(), |_| {});

    let err = ctx.orchestrator.provision(ctx.request("c1")).err().unwrap();
    assert_eq!(err.stage(), "start");
    assert_eq!(ctx.orchestrator.state("c1").unwrap(), VmState::ShutOff);

    ctx.orchestrator.kill("c1").unwrap();
    assert!(ctx.orchestrator.lookup("c1").is_err());
}

#[test]
fn invalid_id_is_rejected() {
    let ctx = TestContext::new();
    let err = ctx.orchestrator.provision(ctx.request("../c1")).err().unwrap();
    assert!(matches!(err, RunvmError::Config(_)));
    assert!(ctx.runner.calls().is_empty());
}

// ============================================================================
// LIFECYCLE CONTROL
// ============================================================================

#[test]
fn pause_and_resume() {
    let ctx = TestContext::new();
    ctx.orchestrator.provision(ctx.request("c1")).unwrap();

    ctx.orchestrator.pause("c1").unwrap();
    assert_eq!(ctx.orchestrator.state("c1").unwrap(), VmState::Paused);

    ctx.orchestrator.resume("c1").unwrap();
    assert_eq!(ctx.orchestrator.state("c1").unwrap(), VmState::Running);

    // Killing a paused domain works too
    ctx.orchestrator.pause("c1").unwrap();
    ctx.orchestrator.kill("c1").unwrap();
    assert!(ctx.hypervisor.domain("c1").is_none());
}

#[test]
fn control_of_unknown_id_is_not_found() {
    let ctx = TestContext::new();
    for result in [
        ctx.orchestrator.kill("ghost"),
        ctx.orchestrator.pause("ghost"),
        ctx.orchestrator.resume("ghost"),
    ] {
        assert!(result.unwrap_err().is_not_found());
    }
    assert!(ctx.orchestrator.state("ghost").unwrap_err().is_not_found());
}

#[tokio::test]
async fn interrupt_trigger_kills_and_removes_vm() {
    let ctx = TestContext::new();
    ctx.orchestrator.provision(ctx.request("c1")).unwrap();
    assert!(ctx.instance_dir("c1").exists());

    let (fire, fired) = tokio::sync::oneshot::channel::<()>();
    let teardown = ctx
        .orchestrator
        .spawn_interrupt_teardown("c1".into(), async move {
            fired.await.ok();
        });
    fire.send(()).unwrap();
    teardown.await.unwrap();

    let err = ctx.orchestrator.lookup("c1").err().unwrap();
    assert!(err.is_not_found());
    assert!(!ctx.instance_dir("c1").exists());
    assert_eq!(ctx.hypervisor.domain_count(), 0);
}

#[tokio::test]
async fn aborted_teardown_leaves_vm_running() {
    let ctx = TestContext::new();
    ctx.orchestrator.provision(ctx.request("c1")).unwrap();

    let teardown = ctx
        .orchestrator
        .spawn_interrupt_teardown("c1".into(), std::future::pending());
    teardown.abort();
    assert!(teardown.await.unwrap_err().is_cancelled());

    assert_eq!(ctx.orchestrator.state("c1").unwrap(), VmState::Running);
}

// ============================================================================
// RUN (CONSOLE BRIDGE)
// ============================================================================

#[tokio::test]
async fn detached_run_returns_without_console() {
    let ctx = TestContext::new();
    let mut request = ctx.request("c1");
    request.detach = true;

    let mut out = Vec::new();
    let status = ctx.orchestrator.run(request, &mut out).await.unwrap();
    assert_eq!(status, 0);
    assert!(out.is_empty());
    assert_eq!(ctx.orchestrator.state("c1").unwrap(), VmState::Running);
}

#[tokio::test]
async fn run_streams_app_console_lines() {
    let ctx = TestContext::new();
    let dir = ctx.instance_dir("c1");
    std::fs::create_dir_all(&dir).unwrap();
    let listener = tokio::net::UnixListener::bind(dir.join("app.sock")).unwrap();

    let guest = tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();
        conn.write_all(b"hello world\r\nsecond\rthird\n").await.unwrap();
    });

    let mut out = Vec::new();
    let status = ctx.orchestrator.run(ctx.request("c1"), &mut out).await.unwrap();
    guest.await.unwrap();

    assert_eq!(status, 0);
    assert_eq!(String::from_utf8(out).unwrap(), "hello world\nsecond\nthird\n");
}

#[tokio::test]
async fn run_tolerates_missing_console() {
    let ctx = TestContext::new();
    let mut out = Vec::new();

    let status = ctx.orchestrator.run(ctx.request("c1"), &mut out).await.unwrap();
    assert_eq!(status, 0);
    assert!(out.is_empty());
}

#[tokio::test]
async fn run_propagates_provisioning_error() {
    let ctx = TestContext::with(
        FakeToolRunner::new().missing("qemu-img"),
        MemoryHypervisor::new(),
        |_| {},
    );
    let mut out = Vec::new();

    let err = ctx.orchestrator.run(ctx.request("c1"), &mut out).await.unwrap_err();
    assert!(matches!(err, RunvmError::ToolNotFound { .. }));
}

#[test]
fn orchestrator_clones_share_state() {
    let ctx = TestContext::new();
    ctx.orchestrator.provision(ctx.request("c1")).unwrap();

    let orchestrator = ctx.orchestrator.clone();
    let handle = std::thread::spawn(move || orchestrator.kill("c1"));
    handle.join().unwrap().unwrap();
    assert!(ctx.orchestrator.lookup("c1").is_err());
}
