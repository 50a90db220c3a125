use carsales_map::chart::yearly_totals;
use carsales_map::client::{GeoJsonSource, GeometryLocation, SalesApi};
use carsales_map::color::ColorBucket;
use carsales_map::map::{LayerStyle, MapOrchestrator, UpdateOutcome};
use carsales_map::resolve::CountryResolver;
use carsales_map::store::SalesStore;
use carsales_map::types::SalesByCode;
use pretty_assertions::assert_eq;
use rusqlite::{params, Connection};

const WORLD: &str = r#"{"type": "FeatureCollection", "features": [
    {"type": "Feature",
     "properties": {"ISO_A3": "USA", "admin": "United States of America"},
     "geometry": {"type": "Polygon", "coordinates": [[[-120, 30], [-80, 30], [-80, 48], [-120, 48], [-120, 30]]]}},
    {"type": "Feature",
     "properties": {"admin": "Unknown"},
     "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]}}
]}"#;

struct Fixture {
    _dir: tempfile::TempDir,
    store: SalesStore,
    geometry: GeoJsonSource,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("sales.db");
    let conn = Connection::open(&db).unwrap();
    conn.execute_batch("CREATE TABLE sales (country_code TEXT, year INTEGER, sales NUMERIC);")
        .unwrap();
    conn.execute(
        "INSERT INTO sales VALUES (?1, ?2, ?3), (?4, ?5, ?6)",
        params!["USA", 2023, 1_200_000, "usa", 2024, 50],
    )
    .unwrap();
    drop(conn);

    let world = dir.path().join("world.geo.json");
    std::fs::write(&world, WORLD).unwrap();

    Fixture {
        store: SalesStore::open_path(&db).unwrap(),
        geometry: GeoJsonSource::new(GeometryLocation::File(world)),
        _dir: dir,
    }
}

#[tokio::test]
async fn store_backed_map_follows_year_selection() {
    let Fixture { _dir, store, geometry } = fixture();
    assert_eq!(SalesApi::list_years(&store).await.unwrap(), vec![2023, 2024]);

    let map = MapOrchestrator::new(
        store,
        geometry,
        CountryResolver::default(),
        LayerStyle::default(),
    );

    assert_eq!(
        map.select_year(2023).await,
        UpdateOutcome::Applied { year: 2023, features: 2 }
    );
    {
        let view = map.view();
        assert_eq!(view.sales(), &SalesByCode::from([("USA".to_string(), 1_200_000.0)]));
        let layer = view.layer().unwrap();
        assert_eq!(layer.features[0].bucket, ColorBucket::MediumDark);
        assert_eq!(layer.features[1].code, "");
        assert_eq!(layer.features[1].bucket, ColorBucket::Neutral);
    }

    map.select_year(2024).await;
    let view = map.view();
    assert_eq!(view.sales(), &SalesByCode::from([("USA".to_string(), 50.0)]));
    assert_eq!(view.layer().unwrap().features[0].bucket, ColorBucket::LightestPositive);
    assert_eq!(
        view.hover_at(-100.0, 40.0).unwrap().to_string(),
        "United States of America\nCars sold: 50"
    );
}

#[tokio::test]
async fn chart_totals_from_store() {
    let Fixture { _dir, store, .. } = fixture();
    let series = yearly_totals(&store).await.unwrap();
    assert_eq!(series.years(), vec![2023, 2024]);
    assert_eq!(series.values(), vec![1_200_000.0, 50.0]);
}
