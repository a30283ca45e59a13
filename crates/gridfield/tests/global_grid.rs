//! Indexing, wraparound and geometry on a 72x37x18 global grid.

use std::f64::consts::PI;

use gridfield::{CompatFlags, GridError, GridField, LoadFlags, SurfaceGrid, VolumeGrid};
use test_utils::{assert_approx_eq, create_surface_data, create_volume_data, pressure_levels, shapes};

fn global_volume() -> VolumeGrid {
    let shape = shapes::GLOBAL_5DEG;
    let mut grid = VolumeGrid::from_parts(
        shape.lons(),
        shape.lats(),
        pressure_levels(shape.nlev),
        create_volume_data(shape.nlon, shape.nlat, shape.nlev),
        LoadFlags::NONE,
    )
    .unwrap();
    grid.set_vertical("pressure");
    grid.set_vunits("hPa", 100.0, 0.0);
    grid.meta_mut().set_quantity("temperature");
    grid.meta_mut().set_units("K", 1.0, 0.0);
    grid
}

#[test]
fn test_documented_wrap_example() {
    test_utils::init_tracing();
    let grid = global_volume();
    let lons = grid.lon_axis();

    assert_eq!(grid.dims(), (72, 37, 18));
    assert!(grid.wraps());
    assert_eq!(grid.longitude(73).unwrap(), 5.0);
    assert_eq!(grid.longitude(1).unwrap(), 5.0);
    assert_eq!(grid.value(-3, 5, 3).unwrap(), grid.value(69, 5, 3).unwrap());
    assert_eq!(lons.iwrap(75).unwrap(), 3);
    assert_eq!(lons.iwrap(-1).unwrap(), 71);
}

#[test]
fn test_iwrap_is_idempotent_and_periodic() {
    let grid = global_volume();
    let lons = grid.lon_axis();
    let n = lons.len() as isize;
    for i in -200..200 {
        let w = lons.iwrap(i).unwrap();
        assert_eq!(lons.iwrap(w as isize).unwrap(), w);
        assert_eq!(lons.value(w as isize).unwrap(), lons.value(i + n).unwrap());
    }
}

#[test]
fn test_coordinate_wrap_and_brackets() {
    let grid = global_volume();
    let lons = grid.lon_axis();
    assert_eq!(lons.wrap(365.0).unwrap(), 5.0);
    assert_eq!(lons.wrap(-5.0).unwrap(), 355.0);
    assert_eq!(lons.wrap(360.0).unwrap(), 360.0);

    assert_eq!(grid.lon_index(2.5).unwrap(), (0, 1));
    assert_eq!(grid.lon_index(357.5).unwrap(), (71, 72));
    assert_eq!(grid.lon_index(-2.5).unwrap(), (71, 72));

    assert_eq!(grid.lat_index(-87.5).unwrap(), (0, 1));
    assert_eq!(grid.lat_index(90.00005).unwrap(), (35, 36));
    assert!(matches!(grid.lat_index(91.0), Err(GridError::BadDataIndex(_))));

    assert_eq!(grid.zindex(975.0).unwrap(), (0, 1));
}

#[test]
fn test_split_join_inverse_everywhere() {
    let grid = global_volume();
    let (nlon, nlat, nlev) = grid.dims();
    for k in 0..nlev {
        for j in 0..nlat {
            for i in 0..nlon {
                let flat = grid.join_index(i as isize, j as isize, k as isize).unwrap();
                assert_eq!(grid.split_index(flat).unwrap(), (i, j, k));
            }
        }
    }
    let size = grid.data_size().unwrap();
    for flat in (0..size).step_by(97) {
        let (i, j, k) = grid.split_index(flat).unwrap();
        assert_eq!(grid.join_index(i as isize, j as isize, k as isize).unwrap(), flat);
    }
}

#[test]
fn test_value_matches_generator() {
    let grid = global_volume();
    assert_eq!(grid.value(5, 10, 3).unwrap(), 300_510.0);
    assert_eq!(grid.value(-1, 0, 17).unwrap(), 1_707_100.0);
}

#[test]
fn test_regional_grid_does_not_wrap() {
    let shape = shapes::REGIONAL;
    let grid = SurfaceGrid::from_parts(
        shape.lons(),
        shape.lats(),
        create_surface_data(shape.nlon, shape.nlat),
        LoadFlags::NONE,
    )
    .unwrap();
    assert!(!grid.wraps());
    assert!(matches!(grid.value(-1, 0), Err(GridError::BadDataIndex(_))));
    assert!(matches!(grid.lon_index(-70.0), Err(GridError::BadDataIndex(_))));
    assert_eq!(grid.value(40, 20).unwrap(), 40_020.0);
}

#[test]
fn test_forced_wrap_flags() {
    let shape = shapes::REGIONAL;
    let data = create_surface_data(shape.nlon, shape.nlat);
    let grid = SurfaceGrid::from_parts(shape.lons(), shape.lats(), data.clone(), LoadFlags::WRAP).unwrap();
    assert!(grid.wraps());

    let both = LoadFlags::WRAP | LoadFlags::NOWRAP;
    assert!(SurfaceGrid::from_parts(shape.lons(), shape.lats(), data.clone(), both).unwrap().wraps());

    let global = shapes::GLOBAL_5DEG;
    let data = create_surface_data(global.nlon, global.nlat);
    let grid = SurfaceGrid::from_parts(global.lons(), global.lats(), data, LoadFlags::NOWRAP).unwrap();
    assert!(!grid.wraps());
}

#[test]
fn test_areas_cover_the_sphere() {
    let grid = global_volume();
    let areas = grid.areas().unwrap();
    let total: f64 = areas.cursor().unwrap().map(f64::from).sum();
    assert_approx_eq!(total, 4.0 * PI, 0.02);

    let mut cursor = grid.level_cursor(7).unwrap();
    let mut weighted = 0.0_f64;
    while let Some(area) = cursor.area() {
        weighted += f64::from(area);
        cursor.advance();
    }
    assert_approx_eq!(weighted, 4.0 * PI, 0.02);
}

#[test]
fn test_dateline_grid_areas() {
    let shape = shapes::GLOBAL_5DEG_NORTH_FIRST;
    let grid = SurfaceGrid::from_parts(
        shape.lons(),
        shape.lats(),
        create_surface_data(shape.nlon, shape.nlat),
        LoadFlags::NONE,
    )
    .unwrap();
    assert!(grid.wraps());
    let total: f64 = grid.areas().unwrap().dump().unwrap().iter().map(|&a| f64::from(a)).sum();
    assert_approx_eq!(total, 4.0 * PI, 0.02);
    assert_eq!(grid.cell_area(0, 18).unwrap(), grid.cell_area(71, 18).unwrap());
}

#[test]
fn test_extracted_level_areas_match_volume() {
    let grid = global_volume();
    let volume_areas = grid.areas().unwrap();
    for k in [0, 9, 17] {
        let sfc = grid.extract_sfc(k).unwrap();
        assert!(grid.compatible_surface(&sfc, CompatFlags::HORIZ | CompatFlags::TIME));
        let sfc_areas = sfc.areas().unwrap();
        assert_eq!(sfc_areas.dump().unwrap(), volume_areas.dump().unwrap());
    }
}

#[test]
fn test_extract_then_replace_level() {
    let mut grid = global_volume();
    let mut sfc = grid.extract_sfc(2).unwrap();
    assert_eq!(sfc.surface(), "900 hPa pressure surface");
    assert_eq!(sfc.value(4, 6).unwrap(), grid.value(4, 6, 2).unwrap());

    // Kelvin to Celsius: stored = mks - 273.15.
    sfc.transform("degC", 1.0, 273.15);
    grid.replace_level(&sfc, 5).unwrap();
    for (i, j) in [(0, 0), (35, 18), (71, 36)] {
        let expected = sfc.value(i, j).unwrap() * 1.0 + 273.15;
        assert_approx_eq!(grid.value(i, j, 5).unwrap(), expected, 0.05);
        assert_approx_eq!(grid.value(i, j, 5).unwrap(), grid.value(i, j, 2).unwrap(), 0.05);
    }
}

#[test]
fn test_mutable_cursor_over_one_level() {
    let mut grid = global_volume();
    {
        let mut cursor = grid.level_cursor_mut(4).unwrap();
        while !cursor.is_end() {
            let (i, j, k) = cursor.indices().unwrap();
            assert_eq!(k, 4);
            cursor.set((i + j) as f32).unwrap();
            cursor.advance();
        }
    }
    assert_eq!(grid.value(10, 20, 4).unwrap(), 30.0);
    assert_eq!(grid.value(10, 20, 3).unwrap(), 301_020.0);
}

#[test]
fn test_profiles_walk_every_column() {
    let grid = global_volume();
    let mut profiles = grid.profiles_at(-1, 36).unwrap();
    assert_eq!(profiles.indices(), Some((71, 36)));
    let column = profiles.profile().unwrap();
    assert_eq!(column.len(), 18);
    assert_eq!(column[2], 207_136.0);
    assert!(!profiles.advance());

    assert_eq!(grid.profiles().unwrap().count(), 72 * 37);
}
