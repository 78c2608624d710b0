//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on a random port and a client socket to
//! verify that frames actually flow over the network, in both directions,
//! and that the frame size limit is enforced on the server side.

use farkle_transport::{
    Connection, TcpConnection, TcpTransport, Transport, TransportError,
};

#[tokio::test]
async fn test_tcp_accept_and_send_receive() {
    let mut transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();

    let server = tokio::spawn(async move {
        let conn = transport.accept().await.expect("should accept");
        let frame = conn.recv().await.expect("recv").expect("frame");
        conn.send(b"pong\n").await.expect("send");
        frame
    });

    let client = TcpConnection::connect(&addr).await.expect("connect");
    client.send(b"ping\n").await.expect("client send");

    let reply = client.recv().await.expect("client recv").expect("frame");
    assert_eq!(reply, b"pong");
    assert_eq!(server.await.unwrap(), b"ping");
}

#[tokio::test]
async fn test_tcp_multiple_frames_in_one_write_are_split() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let conn = transport.accept().await.unwrap();
        let mut frames = Vec::new();
        for _ in 0..3 {
            frames.push(conn.recv().await.unwrap().unwrap());
        }
        frames
    });

    let client = TcpConnection::connect(&addr).await.unwrap();
    client.send(b"one\ntwo\r\nthree\n").await.unwrap();

    let frames = server.await.unwrap();
    assert_eq!(frames, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
}

#[tokio::test]
async fn test_tcp_oversized_frame_fails_the_read() {
    let mut transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .unwrap()
        .max_frame_size(32);
    let addr = transport.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let conn = transport.accept().await.unwrap();
        conn.recv().await
    });

    let client = TcpConnection::connect(&addr).await.unwrap();
    let mut big = vec![b'x'; 200];
    big.push(b'\n');
    client.send(&big).await.unwrap();

    let result = server.await.unwrap();
    assert!(
        matches!(result, Err(TransportError::FrameTooLarge(32))),
        "expected FrameTooLarge, got {result:?}"
    );
}

#[tokio::test]
async fn test_tcp_client_close_yields_none() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let conn = transport.accept().await.unwrap();
        conn.recv().await
    });

    let client = TcpConnection::connect(&addr).await.unwrap();
    client.close().await.unwrap();
    drop(client);

    let result = server.await.unwrap();
    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn test_tcp_connection_ids_are_unique() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap().to_string();

    let a = TcpConnection::connect(&addr).await.unwrap();
    let b = TcpConnection::connect(&addr).await.unwrap();
    let sa = transport.accept().await.unwrap();
    let sb = transport.accept().await.unwrap();

    assert_ne!(a.id(), b.id());
    assert_ne!(sa.id(), sb.id());
}
