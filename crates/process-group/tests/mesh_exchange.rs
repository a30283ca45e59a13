//! Request/reply exchanges between mesh members running on their own threads.

use std::thread;

use process_group::{LocalMesh, ProcessGroup};

const ASK: i32 = 1;
const REPLY: i32 = 2;

#[test]
fn test_request_reply_across_threads() {
    test_utils::init_tracing();

    let mut members = LocalMesh::build(2).into_iter();
    let owner = members.next().unwrap();
    let client = members.next().unwrap();

    let server = thread::spawn(move || {
        let ask = owner.receive_ints(None, None, 2, ASK).unwrap();
        let sum: i32 = ask.value.iter().sum();
        owner
            .send_doubles(ask.source, ask.request, &[f64::from(sum)], REPLY)
            .unwrap();
    });

    let request = client.open_request();
    client.send_ints(0, request, &[20, 22], ASK).unwrap();
    let reply = client.receive_doubles(Some(0), Some(request), 1, REPLY).unwrap();
    assert_eq!(reply.value, vec![42.0]);
    assert_eq!(reply.request, request);

    server.join().unwrap();
}

#[test]
fn test_any_source_receive_serves_every_peer() {
    let members = LocalMesh::build(4);
    let mut iter = members.into_iter();
    let root = iter.next().unwrap();

    let clients: Vec<_> = iter
        .map(|member| {
            thread::spawn(move || {
                let request = member.open_request();
                let id = member.id() as i32;
                member.send_ints(0, request, &[id], ASK).unwrap();
                let reply = member.receive_ints(Some(0), Some(request), 1, REPLY).unwrap();
                assert_eq!(reply.value, vec![id * 10]);
            })
        })
        .collect();

    for _ in 0..3 {
        let ask = root.receive_ints(None, None, 1, ASK).unwrap();
        root.send_ints(ask.source, ask.request, &[ask.value[0] * 10], REPLY)
            .unwrap();
    }

    for c in clients {
        c.join().unwrap();
    }
}

#[test]
fn test_strings_cross_threads() {
    let mut members = LocalMesh::build(2).into_iter();
    let a = members.next().unwrap();
    let b = members.next().unwrap();

    let handle = thread::spawn(move || {
        let got = b.receive_string(Some(0), None, 5).unwrap();
        assert_eq!(got.value, "potential temperature");
    });

    let request = a.open_request();
    a.send_string(1, request, "potential temperature", 5).unwrap();
    handle.join().unwrap();
}
