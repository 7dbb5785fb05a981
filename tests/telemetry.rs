//! Telemetry frames over a loopback TCP connection.

use grid_explorer::grid::{CellCoord, OccupancyGrid};
use grid_explorer::telemetry::{
    RobotState, TcpPublisher, Telemetry, TelemetryClient, TelemetryMessage,
};
use std::time::Duration;

fn connected_pair() -> (Telemetry, TcpPublisher, TelemetryClient) {
    let telemetry = Telemetry::new(64);
    let publisher = TcpPublisher::bind("127.0.0.1:0", &telemetry).unwrap();
    let address = publisher.local_addr().to_string();
    let client = TelemetryClient::connect(&address, Duration::from_secs(2)).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    assert!(publisher.wait_for_client(Some(Duration::from_secs(5))));
    (telemetry, publisher, client)
}

fn sample_state() -> RobotState {
    let mut grid = OccupancyGrid::new(2, 3).unwrap();
    let cell = grid.cell_mut(CellCoord::new(1, 2)).unwrap();
    cell.occupied();
    cell.occupied();
    grid.cell_mut(CellCoord::new(0, 0)).unwrap().set_visited(true);
    RobotState {
        grid: grid.snapshot(),
        current_cell: CellCoord::new(0, 0),
        lap_completed: false,
        elapsed_ms: 1234,
        movements: 0,
    }
}

#[test]
fn test_viewer_receives_greeting_then_stream_in_order() {
    let (telemetry, publisher, mut client) = connected_pair();

    let state = sample_state();
    telemetry.log("[Scan] ===> Scanning cell (0, 1)");
    telemetry.state(state.clone());
    telemetry.close();

    let greeting = client.recv().unwrap().unwrap();
    assert_eq!(greeting, TelemetryMessage::log("===[ CONNECTED ]==="));
    assert_eq!(
        client.recv().unwrap(),
        Some(TelemetryMessage::log("[Scan] ===> Scanning cell (0, 1)"))
    );

    let Some(TelemetryMessage::State(received)) = client.recv().unwrap() else {
        panic!("expected a state frame");
    };
    assert_eq!(received, state);
    let blocked = received.grid.cell(CellCoord::new(1, 2)).unwrap();
    assert_eq!((blocked.m, blocked.c), (2, 2));
    assert_eq!(blocked.p, 1.0);

    let last = client.recv().unwrap().unwrap();
    assert!(last.is_close());

    publisher.stop();
    drop(publisher);
    assert_eq!(client.recv().unwrap(), None);
}

#[test]
fn test_publisher_drains_queue_without_viewers() {
    let telemetry = Telemetry::new(16);
    let publisher = TcpPublisher::bind("127.0.0.1:0", &telemetry).unwrap();
    for i in 0..10 {
        telemetry.log(format!("line {}", i));
    }
    publisher.stop();
    drop(publisher);
    assert!(telemetry.is_empty());
}
