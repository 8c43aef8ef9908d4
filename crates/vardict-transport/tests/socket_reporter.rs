//! 套接字上报器的端到端契约：帧格式、对端关闭、描述符复制与日志。

use std::io::{Read, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use tracing_test::traced_test;
use vardict_core::{
    ACCESS_VAR, AccessEvent, AccessSink, DictionaryBuilder, ReportError, VariableResolver,
};
use vardict_transport::{ReporterError, ReporterStats, SocketReporter};

fn read_exact(peer: &mut UnixStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    peer.read_exact(&mut buf).expect("读取帧");
    buf
}

#[test]
fn report_writes_one_decodable_frame() {
    let (local, mut peer) = UnixStream::pair().expect("socketpair");
    let reporter = SocketReporter::new(OwnedFd::from(local));

    reporter.report(b"CONFIG_FOO").expect("上报成功");

    let frame = read_exact(&mut peer, 12 + b"CONFIG_FOO".len() + 1);
    assert_eq!(u32::from_ne_bytes(frame[0..4].try_into().unwrap()), ACCESS_VAR);
    assert_eq!(u32::from_ne_bytes(frame[4..8].try_into().unwrap()), 11);
    assert_eq!(u32::from_ne_bytes(frame[8..12].try_into().unwrap()), 0);

    let (event, consumed) = AccessEvent::decode(&frame).expect("解码");
    assert_eq!(event.key(), b"CONFIG_FOO");
    assert_eq!(consumed, frame.len());
    assert_eq!(reporter.stats(), ReporterStats { sent: 1, dropped: 0 });
}

#[test]
fn consecutive_reports_arrive_in_order() {
    let (local, mut peer) = UnixStream::pair().expect("socketpair");
    let reporter = SocketReporter::new(OwnedFd::from(local));

    reporter.report(b"A").expect("A");
    reporter.report(b"BB").expect("BB");

    let stream = read_exact(&mut peer, (12 + 2) + (12 + 3));
    let (first, used) = AccessEvent::decode(&stream).expect("first");
    let (second, _) = AccessEvent::decode(&stream[used..]).expect("second");
    assert_eq!(first.key(), b"A");
    assert_eq!(second.key(), b"BB");
}

#[test]
fn closed_peer_yields_transport_error() {
    let (local, peer) = UnixStream::pair().expect("socketpair");
    drop(peer);
    let reporter = SocketReporter::new(OwnedFd::from(local));

    let err = reporter.report(b"CONFIG_FOO").expect_err("对端已关闭");
    assert!(matches!(err, ReportError::Transport { .. }));
    assert_eq!(err.code(), "vardict.report.transport");
    assert_eq!(reporter.stats(), ReporterStats { sent: 0, dropped: 1 });
}

#[test]
fn from_fd_duplicates_host_descriptor() {
    let (local, mut peer) = UnixStream::pair().expect("socketpair");
    let reporter = SocketReporter::from_fd(local.as_fd()).expect("复制描述符");
    drop(reporter);

    // 上报器析构只关闭副本，宿主持有的描述符仍可写。
    (&local).write_all(b"ping").expect("宿主描述符仍可写");
    let buf = read_exact(&mut peer, 4);
    assert_eq!(buf, b"ping");
}

/// 普通文件不是套接字：构造阶段即被拒绝，不会留到首次上报。
#[test]
fn from_fd_rejects_non_socket_descriptor() {
    let file = tempfile::tempfile().expect("临时文件");
    let err = SocketReporter::from_fd(file.as_fd()).expect_err("非套接字描述符");
    assert_eq!(err.code(), "vardict.transport.invalid_descriptor");
    let ReporterError::InvalidDescriptor { source, .. } = &err;
    assert_eq!(source.raw_os_error(), Some(ENOTSOCK));
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const ENOTSOCK: i32 = 88;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const ENOTSOCK: i32 = 38;

#[test]
fn resolver_reports_through_socket() {
    let dict = DictionaryBuilder::new()
        .set("CONFIG_FOO", "y")
        .set("CONFIG_BAR", "n")
        .build()
        .expect("字典");
    let (local, mut peer) = UnixStream::pair().expect("socketpair");
    let reporter = Arc::new(SocketReporter::new(OwnedFd::from(local)));
    let resolver = VariableResolver::new(&dict, &*reporter);

    assert_eq!(resolver.set_boolean_macro(b"CONFIG_FOO").bit(), Some(1));
    // 未命中的变量不产生事件。
    assert_eq!(resolver.set_boolean_macro(b"CONFIG_MISSING").bit(), Some(0));

    let frame = read_exact(&mut peer, 12 + b"CONFIG_FOO".len() + 1);
    let (event, _) = AccessEvent::decode(&frame).expect("解码");
    assert_eq!(event.key(), b"CONFIG_FOO");
    assert_eq!(reporter.stats().sent, 1);
}

#[test]
#[traced_test]
fn successful_report_is_logged_at_debug() {
    let (local, _peer) = UnixStream::pair().expect("socketpair");
    let reporter = SocketReporter::new(OwnedFd::from(local));
    reporter.report(b"CONFIG_LOGGED").expect("上报成功");
    assert!(logs_contain("vardict access event sent"));
    assert!(logs_contain("CONFIG_LOGGED"));
}
