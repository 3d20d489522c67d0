use std::os::fd::AsRawFd;
use std::os::fd::RawFd;
use std::os::unix::net::UnixDatagram;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use castwire::CallEncoder;

use crate::config::TransportSettings;
use crate::context::Acquired;
use crate::mux::Backend;
use crate::mux::EventTag;
use crate::mux::Interest;
use crate::mux::Readiness;
use crate::mux::Side;
use crate::mux::poll::PollBackend;
use crate::outbound::Enqueued;
use crate::outbound::Flushed;
use crate::outbound::OutboundBuffer;
use crate::registry::CallbackTable;
use crate::registry::ClientStubs;
use crate::registry::Registered;
use crate::registry::RemoteNodes;
use crate::registry::ServerFunctions;
use crate::transport;
use crate::transport::Progress;
use crate::transport::Publisher;
use crate::transport::Session;
use crate::transport::TransportEvent;
use crate::transport::WriteStatus;
use crate::*;

// ============================================================================
//  HELPERS
// ============================================================================

/// A publisher that records every packet it accepts.
#[derive(Default)]
struct RecordingPublisher {
    packets: Vec<Vec<u8>>,
    congested: bool,
}

impl Session for RecordingPublisher {
    fn node_id(&self) -> NodeId {
        NodeId(1)
    }

    fn activate(&mut self) -> transport::Result<()> {
        Ok(())
    }

    fn read(&mut self, _index: u16) -> transport::Result<()> {
        Ok(())
    }

    fn write(&mut self, _index: u16) -> transport::Result<WriteStatus> {
        Ok(WriteStatus::NoData)
    }

    fn close_connection(&mut self, _index: u16) {}

    fn next_timeout(&self) -> Option<Instant> {
        None
    }

    fn process_timeout(&mut self) -> transport::Result<Progress> {
        Ok(Progress::Done)
    }

    fn socket_count(&self) -> usize {
        0
    }

    fn take_events(&mut self) -> Vec<TransportEvent> {
        Vec::new()
    }
}

impl Publisher for RecordingPublisher {
    fn queue_packet(&mut self, payload: Vec<u8>) -> transport::Result<()> {
        self.packets.push(payload);
        Ok(())
    }

    fn is_congested(&self) -> bool {
        self.congested
    }

    fn set_announce_interval(&mut self, _interval: Option<Duration>) {}
}

fn noop() -> HandlerRef {
    handler(|_, _| {})
}

/// A context that is never initialized; enough for registries and dispatch.
fn offline_context() -> Context {
    Context::new(Config::default(), Arc::new(LoopbackGroup::new()))
}

fn frame(target: Target<'_>, args: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    CallEncoder::new(NodeId(7), target, args).encode(&mut buf).unwrap();
    buf
}

fn two_ints(a: i32, b: i32) -> Vec<u8> {
    let mut args = Vec::new();
    Writer::new(&mut args).put_i32(a).put_i32(b);
    args
}

// ============================================================================
//  REGISTRIES
// ============================================================================

#[test]
fn test_server_functions_last_wins() {
    let mut servers = ServerFunctions::new(8);
    let first = noop();
    let second = noop();
    servers.register("f", Arc::clone(&first)).unwrap();
    servers.register("g", noop()).unwrap();
    servers.register("f", Arc::clone(&second)).unwrap();

    let found = servers.find("f").unwrap();
    assert!(Arc::ptr_eq(&found, &second));
    assert!(servers.find("missing").is_none());
    assert_eq!(servers.names(), vec!["f".to_string(), "g".to_string()]);
}

#[test]
fn test_server_functions_capacity() {
    let mut servers = ServerFunctions::new(2);
    servers.register("a", noop()).unwrap();
    servers.register("b", noop()).unwrap();
    assert_eq!(
        servers.register("c", noop()),
        Err(Error::CapacityExhausted { table: "server_functions", capacity: 2 })
    );
}

#[test]
fn test_callback_at_most_once() {
    let mut table = CallbackTable::new(8);
    table.activate(CallbackRef(5), noop()).unwrap();

    assert!(table.take_by_ref(CallbackRef(5)).is_some());
    assert!(table.take_by_ref(CallbackRef(5)).is_none());
    assert_eq!(table.live(), 0);
}

#[test]
fn test_callback_slot_reuse() {
    let mut table = CallbackTable::new(2);
    table.activate(CallbackRef(1), noop()).unwrap();
    table.activate(CallbackRef(2), noop()).unwrap();
    assert!(matches!(table.activate(CallbackRef(3), noop()), Err(Error::CapacityExhausted { .. })));

    assert!(table.cancel(CallbackRef(1)));
    table.activate(CallbackRef(3), noop()).unwrap();
    assert_eq!(table.slots(), 2);
    assert_eq!(table.live(), 2);
    assert!(table.contains(CallbackRef(3)));
}

#[test]
fn test_callback_rejects_null_and_live() {
    let mut table = CallbackTable::new(4);
    assert!(matches!(table.activate(CallbackRef(0), noop()), Err(Error::InvalidArgument(_))));
    table.activate(CallbackRef(9), noop()).unwrap();
    assert!(matches!(table.activate(CallbackRef(9), noop()), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_callback_cancel_by_handler() {
    let mut table = CallbackTable::new(4);
    let mine = noop();
    table.activate(CallbackRef(1), noop()).unwrap();
    table.activate(CallbackRef(2), Arc::clone(&mine)).unwrap();

    assert_eq!(table.take_by_handler(&mine), Some(CallbackRef(2)));
    assert_eq!(table.take_by_handler(&mine), None);
    assert!(!table.cancel(CallbackRef(2)));
    assert_eq!(table.live(), 1);
}

#[test]
fn test_remote_nodes() {
    let mut remotes = RemoteNodes::new(8);
    assert_eq!(remotes.register(NodeId(1), "add").unwrap(), Registered::New);
    assert_eq!(remotes.register(NodeId(1), "add").unwrap(), Registered::Duplicate);
    assert_eq!(remotes.register(NodeId(1), "sub").unwrap(), Registered::New);
    assert_eq!(remotes.register(NodeId(2), "add").unwrap(), Registered::New);

    assert!(remotes.serves("sub"));
    assert_eq!(remotes.functions_of(NodeId(1)), vec!["add", "sub"]);

    assert_eq!(remotes.unregister_node(NodeId(1)), 2);
    assert!(!remotes.serves("sub"));
    assert!(remotes.serves("add"));
    assert_eq!(remotes.unregister_node(NodeId(1)), 0);
}

#[test]
fn test_client_stubs() {
    let mut stubs = ClientStubs::new(4);
    stubs.register(StubId(1), "add").unwrap();
    assert_eq!(stubs.name_of(StubId(1)), Some("add"));
    assert_eq!(stubs.name_of(StubId(2)), None);
}

// ============================================================================
//  OUTBOUND BUFFER
// ============================================================================

#[test]
fn test_outbound_busy_at_capacity() {
    let mut out = OutboundBuffer::new(64);
    // 6 header + "f\0" + 56 args = 64
    let args = vec![0xaa; 56];
    assert_eq!(out.enqueue(NodeId(1), Target::Function("f"), &args).unwrap(), Enqueued::Immediate);
    assert_eq!(out.free(), 0);

    assert_eq!(out.enqueue(NodeId(1), Target::Function("f"), &[]), Err(Error::Busy));
    assert_eq!(out.len(), 64);

    let mut publisher = RecordingPublisher::default();
    assert_eq!(out.flush(&mut publisher).unwrap(), Flushed::Sent(64));
    assert!(out.is_empty());
    assert_eq!(out.enqueue(NodeId(1), Target::Function("f"), &[]).unwrap(), Enqueued::Immediate);
}

#[test]
fn test_outbound_oversized_call_never_fits() {
    let mut out = OutboundBuffer::new(64);
    assert_eq!(out.enqueue(NodeId(1), Target::Function("f"), &[0; 57]), Err(Error::Busy));
    assert!(out.is_empty());
}

#[test]
fn test_outbound_invalid_arguments() {
    let mut out = OutboundBuffer::new(1024);
    assert!(matches!(out.enqueue(NodeId(1), Target::Function(""), &[]), Err(Error::InvalidArgument(_))));
    assert!(matches!(
        out.enqueue(NodeId(1), Target::Callback(CallbackRef(0)), &[]),
        Err(Error::InvalidArgument(_))
    ));
    let long = "n".repeat(256);
    assert!(matches!(out.enqueue(NodeId(1), Target::Function(&long), &[]), Err(Error::InvalidArgument(_))));
    assert!(out.is_empty());
}

#[test]
fn test_outbound_buffered_holds_until_flush() {
    let mut out = OutboundBuffer::new(1024);
    let mut publisher = RecordingPublisher::default();
    out.set_buffering(true);

    for i in 0..4u8 {
        assert_eq!(out.enqueue(NodeId(1), Target::Function("seq"), &[i]).unwrap(), Enqueued::Held);
    }
    assert_eq!(out.handoffs(), 0);

    assert!(matches!(out.flush(&mut publisher).unwrap(), Flushed::Sent(_)));
    assert_eq!(out.handoffs(), 1);
    assert_eq!(publisher.packets.len(), 1);

    let args: Vec<u8> = castwire::FrameIter::new(&publisher.packets[0]).map(|f| f.unwrap().args[0]).collect();
    assert_eq!(args, vec![0, 1, 2, 3]);
}

#[test]
fn test_outbound_congestion_holds_data() {
    let mut out = OutboundBuffer::new(1024);
    let mut publisher = RecordingPublisher { congested: true, ..Default::default() };

    out.enqueue(NodeId(1), Target::Function("f"), &[1]).unwrap();
    assert_eq!(out.flush(&mut publisher).unwrap(), Flushed::Congested);
    assert!(!out.is_empty());
    assert!(publisher.packets.is_empty());

    publisher.congested = false;
    assert!(matches!(out.flush(&mut publisher).unwrap(), Flushed::Sent(_)));
    assert_eq!(out.flush(&mut publisher).unwrap(), Flushed::Empty);
}

// ============================================================================
//  DISPATCH
// ============================================================================

#[test]
fn test_dispatch_named_call() {
    let ctx = offline_context();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    ctx.register_server_function("add", move |_, call| {
        let mut r = call.reader();
        let sum = r.get_i32().unwrap() + r.get_i32().unwrap();
        sink.lock().unwrap().push((call.node_id, call.callback_ref, sum, call.args.len()));
    })
    .unwrap();

    let payload = frame(Target::Function("add"), &two_ints(11, 22));
    assert_eq!(ctx.dispatch_payload(&payload), 1);
    assert_eq!(*seen.lock().unwrap(), vec![(NodeId(7), None, 33, 8)]);
}

#[test]
fn test_dispatch_last_registration_wins() {
    let ctx = offline_context();
    let hits = Arc::new(Mutex::new(Vec::new()));
    for tag in ["old", "new"] {
        let hits = Arc::clone(&hits);
        ctx.register_server_function("f", move |_, _| hits.lock().unwrap().push(tag)).unwrap();
    }

    ctx.dispatch_payload(&frame(Target::Function("f"), &[]));
    assert_eq!(*hits.lock().unwrap(), vec!["new"]);
}

#[test]
fn test_dispatch_callback_once() {
    let ctx = offline_context();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&hits);
    let r = ctx.activate_callback(move |_, call| {
        sink.lock().unwrap().push((call.name.to_string(), call.callback_ref));
    });
    assert!(!r.is_null());

    let mut payload = frame(Target::Callback(r), &[1]);
    payload.extend(frame(Target::Callback(r), &[2]));

    assert_eq!(ctx.dispatch_payload(&payload), 1);
    assert_eq!(*hits.lock().unwrap(), vec![(String::new(), Some(r))]);
    assert_eq!(ctx.live_callbacks(), 0);
}

#[test]
fn test_dispatch_unknown_targets_are_skipped() {
    let ctx = offline_context();
    let hits = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    ctx.register_server_function("known", move |_, _| *sink.lock().unwrap() += 1).unwrap();

    let mut payload = frame(Target::Function("unknown"), &[]);
    payload.extend(frame(Target::Callback(CallbackRef(99)), &[]));
    payload.extend(frame(Target::Function("known"), &[]));

    assert_eq!(ctx.dispatch_payload(&payload), 1);
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[test]
fn test_dispatch_skips_undecodable_target() {
    let ctx = offline_context();
    let hits = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    ctx.register_server_function("f", move |_, _| *sink.lock().unwrap() += 1).unwrap();

    // Correctly sized frame whose name is not UTF-8, then a good one.
    let mut payload = Vec::new();
    Writer::new(&mut payload).put_u32(7).put_u16(3).put_bytes(&[0xe9, b'x', 0]);
    payload.extend(frame(Target::Function("f"), &[]));
    // Unterminated name filling its frame exactly.
    Writer::new(&mut payload).put_u32(7).put_u16(2).put_bytes(b"ab");
    payload.extend(frame(Target::Function("f"), &[]));

    assert_eq!(ctx.dispatch_payload(&payload), 2);
    assert_eq!(*hits.lock().unwrap(), 2);
}

#[test]
fn test_dispatch_malformed_payload() {
    let ctx = offline_context();
    let hits = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    ctx.register_server_function("f", move |_, _| *sink.lock().unwrap() += 1).unwrap();

    // Declared length runs past the end.
    let mut truncated = frame(Target::Function("f"), &[1, 2, 3, 4]);
    truncated.truncate(truncated.len() - 1);
    assert_eq!(ctx.dispatch_payload(&truncated), 0);

    // Short header.
    assert_eq!(ctx.dispatch_payload(&[1, 0, 0]), 0);

    // Frames before the corruption still run.
    let mut mixed = frame(Target::Function("f"), &[]);
    mixed.extend_from_slice(&[0xff; 4]);
    assert_eq!(ctx.dispatch_payload(&mixed), 1);
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[test]
fn test_cancelled_callback_is_not_invoked() {
    let ctx = offline_context();
    let hits = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    let h = handler(move |_, _| *sink.lock().unwrap() += 1);
    let r = ctx.activate_callback_handler(Arc::clone(&h));

    assert_eq!(ctx.cancel_callback_handler(&h), Some(r));
    assert!(!ctx.cancel_callback(r));
    assert_eq!(ctx.dispatch_payload(&frame(Target::Callback(r), &[])), 0);
    assert_eq!(*hits.lock().unwrap(), 0);
}

#[test]
fn test_activate_callback_with_chosen_ref() {
    let ctx = offline_context();
    ctx.activate_callback_with(CallbackRef(1), noop()).unwrap();
    assert!(matches!(ctx.activate_callback_with(CallbackRef(1), noop()), Err(Error::InvalidArgument(_))));

    // Generated references skip the one already taken.
    let generated = ctx.activate_callback(|_, _| {});
    assert_ne!(generated, CallbackRef(1));
    assert_eq!(ctx.live_callbacks(), 2);
}

#[test]
fn test_register_rejects_bad_names() {
    let ctx = offline_context();
    assert!(matches!(ctx.register_server_function("", |_, _| {}), Err(Error::InvalidArgument(_))));
    assert!(matches!(ctx.register_client_stub("a\0b"), Err(Error::InvalidArgument(_))));
}

// ============================================================================
//  LOCKING
// ============================================================================

#[test]
fn test_lock_reentry() {
    let ctx = offline_context();
    let outer = ctx.lock();
    assert_eq!(outer.acquired(), Acquired::Fresh);

    let inner = ctx.lock();
    assert_eq!(inner.acquired(), Acquired::Reentered);
    let timed = ctx.lock_until(Instant::now()).unwrap();
    assert_eq!(timed.acquired(), Acquired::Reentered);

    // Operations re-enter too.
    ctx.buffer_calls();
    assert!(ctx.is_buffering());
}

#[test]
fn test_lock_timeout_from_other_thread() {
    let ctx = offline_context();
    let _held = ctx.lock();

    std::thread::scope(|s| {
        let started = Instant::now();
        let result = s
            .spawn(|| ctx.lock_until(Instant::now() + Duration::from_millis(50)).map(|g| g.acquired()))
            .join()
            .unwrap();
        assert_eq!(result, Err(Error::LockTimeout));
        assert!(started.elapsed() >= Duration::from_millis(50));

        let result = s.spawn(|| ctx.process_single_event(Some(Duration::from_millis(20)))).join().unwrap();
        assert_eq!(result, Err(Error::LockTimeout));
    });

    // A lock timeout never initializes the transport.
    drop(_held);
    assert!(!ctx.is_initialized());
}

#[test]
fn test_short_wait_keeps_lock_deadline() {
    let ctx = offline_context();
    ctx.setup().unwrap();
    let held = ctx.lock();

    std::thread::scope(|s| {
        // Zero wait, but the lock may be awaited for the whole deadline.
        let pass = s.spawn(|| ctx.event_pass(Some(Instant::now() + Duration::from_secs(5)), Some(Duration::ZERO)));
        std::thread::sleep(Duration::from_millis(50));
        drop(held);
        let result = pass.join().unwrap();
        assert!(matches!(result, Ok(()) | Err(Error::Timeout)), "{:?}", result);
    });
}

// ============================================================================
//  MULTIPLEXER
// ============================================================================

#[test]
fn test_event_tag_encoding() {
    let tag = EventTag::new(5, Side::Publisher);
    assert_eq!(tag.encode(), 0x8000_8005);
    assert_eq!(EventTag::decode(0x8000_8005), Some(tag));

    let tag = EventTag::new(0x7fff, Side::Subscriber);
    assert_eq!(tag.encode(), 0x8000_7fff);
    assert_eq!(EventTag::decode(tag.encode()), Some(tag));

    // No ownership flag: the application's own event.
    assert_eq!(EventTag::decode(0x0000_8005), None);
}

#[test]
fn test_timeout_rounds_up() {
    assert_eq!(crate::mux::timeout_ms(None), -1);
    assert_eq!(crate::mux::timeout_ms(Some(Duration::ZERO)), 0);
    assert_eq!(crate::mux::timeout_ms(Some(Duration::from_micros(1))), 1);
    assert_eq!(crate::mux::timeout_ms(Some(Duration::from_millis(20))), 20);
    assert_eq!(crate::mux::timeout_ms(Some(Duration::from_secs(u64::MAX))), libc::c_int::MAX);
}

fn exercise_backend(backend: &dyn Backend) {
    let (tx, rx) = UnixDatagram::pair().unwrap();
    let fd = rx.as_raw_fd();
    let tag = EventTag::new(3, Side::Subscriber);
    backend.add(fd, tag, Interest::READ).unwrap();
    assert_eq!(backend.len(), 1);

    let mut out = Vec::new();
    assert_eq!(backend.wait(Some(Duration::ZERO), &mut out).unwrap(), 0);
    assert!(out.is_empty());

    tx.send(&[1]).unwrap();
    assert_eq!(backend.wait(Some(Duration::from_secs(1)), &mut out).unwrap(), 1);
    assert_eq!(out, vec![Readiness { tag, readable: true, writable: false, hangup: false }]);

    backend.modify(fd, tag, Interest::NONE).unwrap();
    out.clear();
    assert_eq!(backend.wait(Some(Duration::ZERO), &mut out).unwrap(), 0);
    assert!(out.is_empty());

    backend.remove(fd).unwrap();
    assert_eq!(backend.len(), 0);
}

#[test]
fn test_poll_backend() {
    exercise_backend(&PollBackend::new());
}

#[test]
fn test_poll_backend_side_table() {
    let backend = PollBackend::new();
    let (_tx, rx) = UnixDatagram::pair().unwrap();
    let fd = rx.as_raw_fd();
    let tag = EventTag::new(1, Side::Publisher);

    backend.add(fd, tag, Interest::READ).unwrap();
    assert_eq!(backend.tag_of(fd), Some(tag));
    assert_eq!(backend.add(fd, tag, Interest::READ).unwrap_err().kind(), std::io::ErrorKind::AlreadyExists);

    backend.remove(fd).unwrap();
    assert_eq!(backend.remove(fd).unwrap_err().kind(), std::io::ErrorKind::NotFound);
    assert_eq!(backend.modify(fd, tag, Interest::READ).unwrap_err().kind(), std::io::ErrorKind::NotFound);
}

#[test]
fn test_poll_backend_closed_descriptor() {
    let backend = PollBackend::new();
    // Never a valid descriptor, so poll reports POLLNVAL.
    let fd = RawFd::MAX - 1;
    let tag = EventTag::new(4, Side::Subscriber);
    backend.add(fd, tag, Interest::READ).unwrap();

    let mut out = Vec::new();
    assert_eq!(backend.wait(Some(Duration::ZERO), &mut out).unwrap(), 1);
    assert_eq!(out, vec![Readiness { tag, readable: false, writable: false, hangup: true }]);
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[test]
fn test_epoll_backend() {
    exercise_backend(&crate::mux::epoll::EpollBackend::new().unwrap());
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[test]
fn test_epoll_backend_counts_foreign_events() {
    let backend = crate::mux::epoll::EpollBackend::new().unwrap();
    let (tx, rx) = UnixDatagram::pair().unwrap();
    let mut event = libc::epoll_event { events: libc::EPOLLIN as u32, u64: 42 };
    let ret = unsafe { libc::epoll_ctl(backend.as_raw_fd(), libc::EPOLL_CTL_ADD, rx.as_raw_fd(), &mut event) };
    assert_eq!(ret, 0);
    tx.send(&[1]).unwrap();

    let mut out = Vec::new();
    assert_eq!(backend.wait(Some(Duration::from_secs(1)), &mut out).unwrap(), 1);
    assert!(out.is_empty());
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[test]
fn test_readiness_from_epoll() {
    let data = EventTag::new(2, Side::Publisher).encode() as u64;
    let r = Readiness::from_epoll(data, (libc::EPOLLIN | libc::EPOLLHUP) as u32).unwrap();
    assert_eq!(r.tag, EventTag::new(2, Side::Publisher));
    assert!(r.readable && r.hangup && !r.writable);

    assert!(Readiness::from_epoll(42, libc::EPOLLIN as u32).is_none());
}

// ============================================================================
//  CONFIGURATION
// ============================================================================

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.node_id, NodeId(0));
    assert_eq!(config.max_nodes, 32);
    assert_eq!(config.mcast_group_addr.to_string(), "239.40.41.42");
    assert_eq!(config.mcast_group_port, 4723);
    assert_eq!(config.mcast_ttl, 1);
    assert_eq!(config.control_listen_port, 0);
    assert_eq!(config.log_level, 2);
    assert_eq!(config.max_payload, 64512);
    assert_eq!(config.symtab_size, 128);
    assert_eq!(config.announce_interval, Duration::from_millis(200));
}

#[test]
fn test_config_from_lookup() {
    let vars = [
        ("CASTRUN_NODE_ID", "0x2a"),
        ("CASTRUN_MAX_NODES", "8"),
        ("CASTRUN_MCAST_GROUP_ADDR", "239.1.2.3"),
        ("CASTRUN_MCAST_GROUP_PORT", "not-a-port"),
        ("CASTRUN_MCAST_TTL", "4"),
        ("CASTRUN_CONTROL_LISTEN_PORT", "5000"),
        ("CASTRUN_LOG_LEVEL", "9"),
    ];
    let config = Config::from_lookup(|key| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string()));

    assert_eq!(config.node_id, NodeId(42));
    assert_eq!(config.max_nodes, 8);
    assert_eq!(config.mcast_group_addr.to_string(), "239.1.2.3");
    // Unparseable and out of range values fall back to defaults.
    assert_eq!(config.mcast_group_port, 4723);
    assert_eq!(config.log_level, 2);
    assert_eq!(config.mcast_ttl, 4);
    assert_eq!(config.control_listen_port, 5000);

    let settings = config.transport_settings();
    assert_eq!(settings.max_nodes, 8);
    assert_eq!(TransportSettings::default().mcast_group_port, 4723);
}

#[test]
fn test_config_node_id_resolution() {
    assert_eq!(Config::default().with_node_id(NodeId(9)).resolve_node_id(), NodeId(9));
    for _ in 0..32 {
        assert_ne!(Config::default().resolve_node_id(), NodeId(0));
    }
}

#[test]
fn test_log_levels() {
    use tracing_subscriber::filter::LevelFilter;
    assert_eq!(crate::logging::level_filter(0), LevelFilter::OFF);
    assert_eq!(crate::logging::level_filter(2), LevelFilter::ERROR);
    assert_eq!(crate::logging::level_filter(3), LevelFilter::WARN);
    assert_eq!(crate::logging::level_filter(6), LevelFilter::TRACE);
    crate::logging::init(0);
    crate::logging::init(6);
}
