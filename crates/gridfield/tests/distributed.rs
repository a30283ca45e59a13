//! Owner and requesters exchanging metadata and values over a local mesh.

use std::sync::Arc;
use std::thread;

use gridfield::protocol::{commands, tags};
use gridfield::{
    CompatFlags, Distributed, FetchFlags, GridError, GridField, LoadFlags, Session, SurfaceGrid, VolumeGrid,
};
use process_group::{LocalMesh, ProcessGroup, RequestId};
use test_utils::{create_surface_data, create_volume_data, pressure_levels, shapes};

fn owned_volume() -> VolumeGrid {
    let shape = shapes::GLOBAL_5DEG;
    let nlev = 4;
    let mut grid = VolumeGrid::from_parts(
        shape.lons(),
        shape.lats(),
        pressure_levels(nlev),
        create_volume_data(shape.nlon, shape.nlat, nlev),
        LoadFlags::NONE,
    )
    .unwrap();
    grid.set_vertical("pressure");
    grid.set_vunits("hPa", 100.0, 0.0);
    let meta = grid.meta_mut();
    meta.set_quantity("temperature");
    meta.set_units("K", 1.0, 0.0);
    meta.set_time(6.0, "2024-06-01T06:00:00");
    grid.set_fill_value(-999.0);
    grid
}

fn owned_surface() -> SurfaceGrid {
    let shape = shapes::REGIONAL;
    let mut grid = SurfaceGrid::from_parts(
        shape.lons(),
        shape.lats(),
        create_surface_data(shape.nlon, shape.nlat),
        LoadFlags::NONE,
    )
    .unwrap();
    grid.set_surface("sea level");
    grid.meta_mut().set_quantity("pressure");
    grid.meta_mut().set_units("Pa", 1.0, 0.0);
    grid.meta_mut().set_time(0.0, "2024-06-01T00:00:00");
    grid
}

fn mesh(size: usize) -> Vec<Arc<dyn ProcessGroup>> {
    LocalMesh::build(size)
        .into_iter()
        .map(|member| Arc::new(member) as Arc<dyn ProcessGroup>)
        .collect()
}

#[test]
fn test_requester_fetches_metadata_then_values() {
    test_utils::init_tracing();
    let mut groups = mesh(2).into_iter();
    let owner_group = groups.next().unwrap();
    let requester_group = groups.next().unwrap();

    let server = thread::spawn(move || {
        let mut grid = owned_volume();
        grid.set_group(owner_group, 0).unwrap();
        grid.svr_start().unwrap()
    });

    let mut grid = VolumeGrid::new();
    grid.set_group(requester_group, 0).unwrap();
    assert!(grid.is_distributed());
    assert!(!grid.is_owner());
    assert!(grid.svr_start().unwrap());

    grid.fetch_meta().unwrap();
    assert_eq!(grid.quantity(), "temperature");
    assert_eq!(grid.units(), "K");
    assert_eq!(grid.meta().met_time(), "2024-06-01T06:00:00");
    assert_eq!(grid.time(), 6.0);
    assert_eq!(grid.fill_value(), -999.0);
    assert_eq!(grid.vertical(), "pressure");
    assert_eq!(grid.vunits(), "hPa");
    assert_eq!(grid.dims(), (72, 37, 4));
    assert!(grid.wraps());
    assert!(!grid.has_data());
    assert!(grid.compatible(&owned_volume(), CompatFlags::STRICT));

    let values = grid
        .gridpoints(&[(-1, 0, 0), (5, 10, 3), (73, 36, 1)], FetchFlags::DONE)
        .unwrap();
    assert_eq!(values, vec![7_100.0, 300_510.0, 100_136.0]);

    assert!(!server.join().unwrap());
}

#[test]
fn test_owner_answers_bad_indices_with_fill() {
    let mut groups = mesh(2).into_iter();
    let owner_group = groups.next().unwrap();
    let requester_group = groups.next().unwrap();

    let server = thread::spawn(move || {
        let mut grid = owned_volume();
        grid.set_group(owner_group, 0).unwrap();
        grid.svr_listen(Some(1)).unwrap();
    });

    let mut grid = VolumeGrid::new();
    grid.set_group(requester_group, 0).unwrap();
    let values = grid
        .gridpoints_flat(&[0, 10_000_000, 1], FetchFlags::NONE)
        .unwrap();
    assert_eq!(values, vec![0.0, -999.0, 100.0]);
    grid.svr_done().unwrap();

    server.join().unwrap();
}

#[test]
fn test_owner_serves_every_requester() {
    let mut groups = mesh(4).into_iter();
    let owner_group = groups.next().unwrap();

    let requesters: Vec<_> = groups
        .map(|group| {
            thread::spawn(move || {
                let id = group.id();
                let mut grid = SurfaceGrid::new();
                grid.set_group(group, 0).unwrap();
                grid.fetch_meta().unwrap();
                assert_eq!(grid.surface(), "sea level");
                assert!(!grid.wraps());
                let i = id as isize * 10;
                let values = grid.gridpoints(&[(i, 0), (i, 20)], FetchFlags::DONE).unwrap();
                assert_eq!(values, vec![(i * 1000) as f32, (i * 1000 + 20) as f32]);
            })
        })
        .collect();

    let mut grid = owned_surface();
    grid.set_group(owner_group, 0).unwrap();
    assert!(!grid.svr_start().unwrap());

    for r in requesters {
        r.join().unwrap();
    }
}

#[test]
fn test_split_metadata_session() {
    let mut groups = mesh(2).into_iter();
    let owner_group = groups.next().unwrap();
    let requester_group = groups.next().unwrap();

    let server = thread::spawn(move || {
        let mut grid = owned_surface();
        grid.set_group(owner_group, 0).unwrap();
        grid.svr_listen(None).unwrap();
    });

    let mut grid = SurfaceGrid::new();
    grid.set_group(requester_group, 0).unwrap();
    let session = grid.ask_for_meta().unwrap();
    assert!(!session.is_local());
    grid.receive_meta(session).unwrap();
    assert_eq!(grid.quantity(), "pressure");
    assert_eq!(grid.dims(), (41, 21));
    assert!(matches!(grid.receive_meta(Session::local()), Err(GridError::Sequence(_))));
    grid.svr_done().unwrap();

    server.join().unwrap();
}

#[test]
fn test_reply_from_another_session_is_rejected() {
    let mut groups = mesh(2).into_iter();
    let owner_group = groups.next().unwrap();
    let requester_group = groups.next().unwrap();

    let server = thread::spawn(move || {
        let ask = owner_group.receive_ints(None, None, 1, tags::GREQ).unwrap();
        assert_eq!(ask.value, vec![commands::GMETA]);
        let stale = RequestId::new(ask.source, ask.request.seq + 100);
        owner_group
            .send_string(ask.source, stale, "temperature", tags::GMETA)
            .unwrap();
    });

    let mut grid = SurfaceGrid::new();
    grid.set_group(requester_group, 0).unwrap();
    let err = grid.fetch_meta().unwrap_err();
    assert!(matches!(err, GridError::Sequence(_)));

    server.join().unwrap();
}
