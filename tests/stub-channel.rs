//! Runs a channel with the stub engine against a local UDP server.

use resolv_channel::engine::conf::ResolvConf;
use resolv_channel::engine::stub::StubFactory;
use resolv_channel::engine::ServerAddr;
use resolv_channel::record::{Answer, Mx};
use resolv_channel::{Channel, ChannelOptions, Error, Status};
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::LocalSet;

/// Answers MX queries for any name except those starting with `nx`.
async fn serve(sock: UdpSocket) {
    let mut buf = [0u8; 512];
    loop {
        let (len, peer) = match sock.recv_from(&mut buf).await {
            Ok(res) => res,
            Err(_) => return,
        };
        if let Some(response) = respond(&buf[..len]) {
            let _ = sock.send_to(&response, peer).await;
        }
    }
}

fn respond(query: &[u8]) -> Option<Vec<u8>> {
    // Skip the question name to find the end of the question.
    let mut pos = 12;
    loop {
        let len = usize::from(*query.get(pos)?);
        pos += 1;
        if len == 0 {
            break;
        }
        pos += len;
    }
    let question_end = pos + 4;
    let nx = query.get(13..15)? == b"nx";

    let mut res = Vec::from(query.get(..question_end)?);
    res[2] |= 0x80;
    res[3] = 0x80 | if nx { 3 } else { 0 };
    res[6..12].copy_from_slice(&[0, 0, 0, 0, 0, 0]);
    if nx {
        return Some(res);
    }
    res[7] = 1;
    res.extend_from_slice(&[0xc0, 0x0c, 0, 15, 0, 1, 0, 0, 0x0e, 0x10]);
    let exchange = b"\x04mail\xc0\x0c";
    res.extend_from_slice(&(2 + exchange.len() as u16).to_be_bytes());
    res.extend_from_slice(&10u16.to_be_bytes());
    res.extend_from_slice(exchange);
    Some(res)
}

fn channel(addr: SocketAddr, options: ChannelOptions) -> Channel {
    let mut conf = ResolvConf::new();
    conf.servers.push(ServerAddr::new(addr.ip(), addr.port()));
    conf.timeout = Duration::from_millis(100);
    conf.attempts = 1;
    Channel::with_factory(options, Rc::new(StubFactory::with_conf(conf)))
        .unwrap()
}

#[tokio::test]
async fn query_mx() {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = sock.local_addr().unwrap();
    tokio::spawn(serve(sock));

    LocalSet::new()
        .run_until(async move {
            let channel = channel(addr, ChannelOptions::default());
            let answer = channel.query_mx("example.com").await.unwrap();
            assert_eq!(
                answer,
                Answer::Found(vec![Mx {
                    exchange: "mail.example.com".into(),
                    priority: 10,
                }])
            );
            assert_eq!(channel.active_queries(), 0);

            let err = channel.query_mx("nx.example.com").await.unwrap_err();
            assert_eq!(err.status(), Some(Status::NotFound));
        })
        .await;
}

#[tokio::test]
async fn silent_server_times_out() {
    // Bound but never read from.
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = sock.local_addr().unwrap();

    LocalSet::new()
        .run_until(async move {
            let channel = channel(
                addr,
                ChannelOptions {
                    timeout: Some(50),
                    tries: Some(1),
                },
            );
            let res = channel.query_mx("example.com").await;
            assert!(matches!(res, Err(Error::Resolve(Status::Timeout))));
            assert_eq!(channel.active_queries(), 0);
        })
        .await;
    drop(sock);
}

#[tokio::test]
async fn refused_connection_fails_fast() {
    // Nobody listens on the port once the socket is gone.
    let addr = std::net::UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    LocalSet::new()
        .run_until(async move {
            let channel = channel(
                addr,
                ChannelOptions {
                    timeout: Some(3000),
                    tries: Some(1),
                },
            );
            let res = tokio::time::timeout(
                Duration::from_secs(2),
                channel.query_mx("example.com"),
            )
            .await
            .expect("refused query waited for its timeout");
            assert!(matches!(res, Err(Error::Resolve(Status::ConnRefused))));
            assert_eq!(channel.active_queries(), 0);
        })
        .await;
}
