//! S5 (spec.md §8): a sink-side listener ingests a neighbor report sent
//! over a real TCP loopback connection.

use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use uavmesh_core::{NodeIp, Position, Stoppable};
use uavmesh_neighbor::ingest::TopologyIngest;
use uavmesh_neighbor::listener::{NeighborListener, ReportDisposition};
use uavmesh_neighbor::live_packet::LivePacket;
use uavmesh_neighbor::report::NeighborReport;

#[derive(Default)]
struct RecordingIngest {
    calls: Mutex<Vec<(NodeIp, Vec<(NodeIp, Position)>)>>,
}

impl TopologyIngest for RecordingIngest {
    fn ingest_report(&self, sender: NodeIp, neighbors: &[(NodeIp, Position)]) {
        self.calls.lock().unwrap().push((sender, neighbors.to_vec()));
    }
}

fn ip(s: &str) -> NodeIp {
    NodeIp::from_str(s).unwrap()
}

#[tokio::test]
async fn sink_ingests_relayed_report() {
    let tcp_listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = tcp_listener.local_addr().unwrap();

    let ingest = Arc::new(RecordingIngest::default());
    let stoppable = Stoppable::new();
    let listener =
        NeighborListener::new(tcp_listener, ReportDisposition::Ingest(ingest.clone()), stoppable.clone());
    let listener_task = tokio::spawn(async move { listener.run().await });

    let report = NeighborReport {
        sender: ip("192.168.2.101"),
        sender_position: Position::new(1.0, 2.0),
        neighbors: vec![LivePacket::new(ip("192.168.2.102"), Position::new(3.0, 4.0))],
    };
    let buf = report.serialize().unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&buf).await.unwrap();
    drop(stream);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let calls = ingest.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, ip("192.168.2.101"));
    assert_eq!(calls[0].1, vec![(ip("192.168.2.102"), Position::new(3.0, 4.0))]);

    stoppable.stop();
    let _ = tokio::time::timeout(Duration::from_secs(1), listener_task).await;
}
