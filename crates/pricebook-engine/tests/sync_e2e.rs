//! End-to-end synchronization tests against mocked feeds.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricebook_engine::model::ResourceKind;
use pricebook_engine::{CatalogStore, MemoryStore, SyncConfig, Synchronizer};

/// Enable log capture for a test; output shows up on failure only.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pricebook_engine=debug")),
        )
        .with_test_writer()
        .try_init();
}

const OFFER_INDEX: &str = r#"{"offers": {
  "Compute": {"currentRegionIndexUrl": "/offers/compute/region_index.json", "savingsPlanIndexUrl": "/offers/compute/savings_plan_index.json"},
  "Database": {"currentRegionIndexUrl": "/offers/database/region_index.json"},
  "Container": {"currentRegionIndexUrl": "/offers/container/region_index.json"},
  "Functions": {"currentVersionUrl": "/offers/functions/index.csv"},
  "ObjectStorage": {"currentVersionUrl": "/offers/object/index.csv"},
  "FileStorage": {"currentVersionUrl": "/offers/file/index.csv"}
}}"#;

fn region_index(offer: &str) -> String {
    format!(
        r#"{{"regions": {{"eu-west-1": {{"regionCode": "eu-west-1", "currentVersionUrl": "/offers/{offer}/eu-west-1/index.csv"}}}}}}"#
    )
}

const COMPUTE_HEADER: &str = "SKU,OfferTermCode,TermType,PricePerUnit,Unit,LeaseContractLength,PurchaseOption,OfferingClass,Location,Product Family,Instance Type,vCPU,Memory,Physical Processor,Network Performance,Current Generation,Storage,Tenancy,Operating System,Pre Installed S/W,License Model,CapacityStatus";

fn compute_csv(with_on_demand: bool) -> String {
    let mut csv = String::from(
        "\"Price disclaimer: subject to change\"\n\"Publication Date\",\"2026-08-01\"\n",
    );
    csv.push_str(COMPUTE_HEADER);
    csv.push('\n');
    if with_on_demand {
        csv.push_str("SKUC5X,JRTCKXETXF,OnDemand,0.25,Hrs,,,,EU (Ireland),Compute Instance,c5.xlarge,4,8 GiB,Intel Xeon,Up to 10 Gigabit,Yes,EBS only,Shared,Linux,,No License required,Used\n");
    }
    // A reserved price split across two rows.
    csv.push_str("SKUC5X,HU7G6KETJZ,Reserved,77,Quantity,3yr,Partial Upfront,standard,EU (Ireland),Compute Instance,c5.xlarge,4,8 GiB,Intel Xeon,Up to 10 Gigabit,Yes,EBS only,Shared,Linux,,No License required,Used\n");
    csv.push_str("SKUC5X,HU7G6KETJZ,Reserved,0.003,Hrs,3yr,Partial Upfront,standard,EU (Ireland),Compute Instance,c5.xlarge,4,8 GiB,Intel Xeon,Up to 10 Gigabit,Yes,EBS only,Shared,Linux,,No License required,Used\n");
    // A split half whose partner never arrives.
    csv.push_str("SKUORP,AAAA1111,Reserved,100,Quantity,1yr,All Upfront,standard,EU (Ireland),Compute Instance,c5.xlarge,4,8 GiB,Intel Xeon,Up to 10 Gigabit,Yes,EBS only,Shared,Linux,,No License required,Used\n");
    // Dedicated tenancy is filtered out by the validity predicate.
    csv.push_str("SKUDED,JRTCKXETXF,OnDemand,0.27,Hrs,,,,EU (Ireland),Compute Instance,c5.xlarge,4,8 GiB,Intel Xeon,Up to 10 Gigabit,Yes,EBS only,Dedicated,Linux,,No License required,Used\n");
    csv
}

const DATABASE_CSV: &str = "\
\"preamble\"
SKU,OfferTermCode,TermType,PricePerUnit,Unit,LeaseContractLength,PurchaseOption,OfferingClass,Location,Product Family,Instance Type,vCPU,Memory,Physical Processor,Network Performance,Current Generation,Storage,Deployment Option,Database Engine,Database Edition,Volume Type,License Model
SKUDBR5,JRTCKXETXF,OnDemand,0.29,Hrs,,,,EU (Ireland),Database Instance,db.r5.large,2,16 GiB,Intel Xeon,High,Yes,EBS only,Single-AZ,MySQL,,,No license required
SKUDBSTG,JRTCKXETXF,OnDemand,0.115,GB-Mo,,,,EU (Ireland),Database Storage,,,,,,,,Single-AZ,MySQL,,General Purpose,
";

const CONTAINER_CSV: &str = "\
\"preamble\"
SKU,OfferTermCode,TermType,PricePerUnit,Unit,LeaseContractLength,PurchaseOption,OfferingClass,Location,Product Family,Instance Type,vCPU,Memory,Network Performance,Current Generation,Operating System
SKUCT1,JRTCKXETXF,OnDemand,0.04,Hrs,,,,EU (Ireland),Container Instance,ct.medium,1,2 GiB,Moderate,Yes,Linux
";

const FUNCTIONS_CSV: &str = "\
\"preamble\"
SKU,OfferTermCode,TermType,PricePerUnit,Unit,Location,Product Family,Group
SKUFND,JRTCKXETXF,OnDemand,0.0000166667,GB-Second,EU (Ireland),Serverless,Duration
SKUFNR,JRTCKXETXF,OnDemand,0.0000002,Requests,EU (Ireland),Serverless,Requests
";

const OBJECT_CSV: &str = "\
\"preamble\"
SKU,OfferTermCode,TermType,PricePerUnit,Unit,Location,Product Family,Storage Class
SKUS3STD,JRTCKXETXF,OnDemand,0.023,GB-Mo,EU (Ireland),Storage,General Purpose
";

const FILE_CSV: &str = "\
\"preamble\"
SKU,OfferTermCode,TermType,PricePerUnit,Unit,Location,Product Family,Storage Class
SKUEFS,JRTCKXETXF,OnDemand,0.30,GB-Mo,EU (Ireland),Storage,General Purpose
";

const SAVINGS_INDEX: &str = r#"{"regions": [{"regionCode": "eu-west-1", "versionUrl": "/offers/compute/eu-west-1/savings_plan.json"}]}"#;

// One fleet-wide plan: a usable rate on a known SKU, an unused
// capacity dimension, and a rate whose SKU has no on-demand price.
const SAVINGS_JSON: &str = r#"{"terms": {"savingsPlan": [{
  "sku": "PLANSKU1",
  "description": "3 year No Upfront Compute Savings Plan",
  "leaseContractLength": {"duration": 3},
  "rates": [
    {"discountedSku": "SKUC5X", "discountedUsageType": "BoxUsage:c5.xlarge", "rateCode": "PLANSKU1.SKUC5X.RATE1", "discountedRate": {"price": 0.16}},
    {"discountedSku": "SKUC5X", "discountedUsageType": "UnusedBox:c5.xlarge", "rateCode": "PLANSKU1.SKUC5X.RATE2", "discountedRate": {"price": 0.16}},
    {"discountedSku": "SKUGONE", "discountedUsageType": "BoxUsage:m5.large", "rateCode": "PLANSKU1.SKUGONE.RATE1", "discountedRate": {"price": 0.05}}
  ]
}]}}"#;

// The spot and block feeds use the legacy region code to exercise
// the rename table.
const SPOT_JSON: &str = r#"callback({"config": {"regions": [{"region": "eu-ireland", "instanceTypes": [{"name": "c5.xlarge", "osPrices": [{"name": "linux", "prices": {"USD": "0.09"}}, {"name": "mswin", "prices": {"USD": "N/A*"}}]}]}]}});"#;

const BLOCK_JSON: &str = r#"callback({"config": {"regions": [{"region": "eu-ireland", "types": [{"name": "General Purpose", "values": [{"rate": "perGBmoProvStorage", "prices": {"USD": "0.11"}}, {"rate": "perPIOPSreq", "prices": {"USD": "0.065"}}]}]}]}});"#;

async fn mount(server: &MockServer, url: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(url))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_all(server: &MockServer, with_on_demand: bool, with_spot: bool, with_savings: bool) {
    mount(server, "/offers/v1.0/index.json", OFFER_INDEX).await;
    mount(server, "/offers/compute/region_index.json", &region_index("compute")).await;
    mount(server, "/offers/database/region_index.json", &region_index("database")).await;
    mount(server, "/offers/container/region_index.json", &region_index("container")).await;
    mount(server, "/offers/compute/eu-west-1/index.csv", &compute_csv(with_on_demand)).await;
    mount(server, "/offers/database/eu-west-1/index.csv", DATABASE_CSV).await;
    mount(server, "/offers/container/eu-west-1/index.csv", CONTAINER_CSV).await;
    mount(server, "/offers/functions/index.csv", FUNCTIONS_CSV).await;
    mount(server, "/offers/object/index.csv", OBJECT_CSV).await;
    mount(server, "/offers/file/index.csv", FILE_CSV).await;
    if with_spot {
        mount(server, "/spot/prices.json", SPOT_JSON).await;
    }
    if with_savings {
        mount(server, "/offers/compute/savings_plan_index.json", SAVINGS_INDEX).await;
        mount(server, "/offers/compute/eu-west-1/savings_plan.json", SAVINGS_JSON).await;
    }
    mount(server, "/pricing/block-storage.js", BLOCK_JSON).await;
}

fn config_for(server: &MockServer) -> SyncConfig {
    SyncConfig {
        base_url: server.uri(),
        ..SyncConfig::default()
    }
}

fn harness(server: &MockServer) -> (Arc<MemoryStore>, Synchronizer) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let synchronizer = Synchronizer::new(config_for(server), store.clone()).unwrap();
    (store, synchronizer)
}

#[tokio::test]
async fn test_full_sync_populates_catalog() {
    let server = MockServer::start().await;
    mount_all(&server, true, true, true).await;
    let (store, sync) = harness(&server);

    let stats = sync.synchronize(false).await.unwrap();

    // On-demand compute: 0.25/h over 732h/month.
    let on_demand = store.price("SKUC5X.JRTCKXETXF").unwrap();
    assert_eq!(on_demand.cost, 183.0);
    assert_eq!(on_demand.type_code, "c5.xlarge");
    assert_eq!(on_demand.region_code, "eu-west-1");
    assert_eq!(on_demand.os.as_deref(), Some("Linux"));

    // Reserved split pair reconciled.
    let reserved = store.price("SKUC5X.HU7G6KETJZ").unwrap();
    assert_eq!(reserved.initial_cost, 77.0);
    assert_eq!(reserved.cost, 4.335);
    assert_eq!(reserved.cost_period, 156.056);

    // The orphan half was never persisted, only counted.
    assert!(store.price("SKUORP.AAAA1111").is_none());
    assert_eq!(stats.orphaned_splits, 1);

    // Dedicated tenancy was filtered out.
    assert!(store.price("SKUDED.JRTCKXETXF").is_none());

    // Spot price, with the legacy region code canonicalized and the
    // unavailable Windows entry skipped.
    let spot = store.price("spot-eu-west-1-c5.xlarge-Linux").unwrap();
    assert_eq!(spot.cost, 65.88);
    assert_eq!(spot.term_code, "spot");
    assert!(store.price("spot-eu-west-1-c5.xlarge-Windows").is_none());

    // Savings-plan rate inherits the on-demand attributes. Unused
    // capacity dimensions and rates on SKUs without an on-demand
    // price never become catalog prices.
    let plan = store.price("plan-PLANSKU1.SKUC5X.RATE1").unwrap();
    assert_eq!(plan.cost, 117.12);
    assert_eq!(plan.cost_period, 4216.32);
    assert_eq!(plan.type_code, "c5.xlarge");
    assert_eq!(plan.os.as_deref(), Some("Linux"));
    assert_eq!(plan.term_code, "PLANSKU1");
    assert!(store.price("plan-PLANSKU1.SKUC5X.RATE2").is_none());
    assert!(store.price("plan-PLANSKU1.SKUGONE.RATE1").is_none());

    // Database instance and its storage row.
    let db = store.price("SKUDBR5.JRTCKXETXF").unwrap();
    assert_eq!(db.engine.as_deref(), Some("MySQL"));
    let db_storage = store.storage_price("SKUDBSTG").unwrap();
    assert_eq!(db_storage.type_code, "db-gp");
    assert_eq!(db_storage.cost_gb, 0.115);

    // Container, function, object and file offerings.
    assert!(store.price("SKUCT1.JRTCKXETXF").is_some());
    let function = store.price("SKUFND").unwrap();
    assert_eq!(function.kind, ResourceKind::Function);
    assert_eq!(function.cost_ram, Some(43.92));
    assert_eq!(function.cost_requests, Some(0.2));
    assert_eq!(store.storage_price("SKUS3STD").unwrap().type_code, "object-standard");
    assert_eq!(store.storage_price("SKUEFS").unwrap().type_code, "file-standard");

    // Block storage from the callback-wrapped feed.
    let gp2 = store.storage_price("eu-west-1-gp2").unwrap();
    assert_eq!(gp2.cost_gb, 0.11);

    // Region carries its geography.
    let regions = store.regions().await.unwrap();
    let ireland = regions.iter().find(|r| r.code == "eu-west-1").unwrap();
    assert_eq!(ireland.name, "EU (Ireland)");
    assert_eq!(ireland.country.as_deref(), Some("IE"));

    // Term derived from the reserved rows.
    let terms = store.terms().await.unwrap();
    let reserved_term = terms.iter().find(|t| t.code == "HU7G6KETJZ").unwrap();
    assert_eq!(reserved_term.name, "Reserved, 3yr, Partial Upfront");
    assert_eq!(reserved_term.period, 36.0);
    assert!(reserved_term.upfront);

    // Term derived from the savings-plan description.
    let plan_term = terms.iter().find(|t| t.code == "PLANSKU1").unwrap();
    assert_eq!(plan_term.name, "Compute Savings Plan, 3yr, No Upfront");
    assert_eq!(plan_term.period, 36.0);
    assert!(!plan_term.reservation);
    assert!(plan_term.convertible_type);
    assert!(plan_term.convertible_location);

    assert!(stats.prices > 0);
    assert!(stats.storage_prices >= 4);
    assert_eq!(stats.purged, 0);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    mount_all(&server, true, true, true).await;
    let (store, sync) = harness(&server);

    sync.synchronize(false).await.unwrap();
    let writes_after_first = store.write_count();
    assert!(writes_after_first > 0);

    let stats = sync.synchronize(false).await.unwrap();
    assert_eq!(store.write_count(), writes_after_first);
    assert_eq!(stats.purged, 0);

    // Force recomputes everything but still writes nothing when the
    // feeds did not change.
    sync.synchronize(true).await.unwrap();
    assert_eq!(store.write_count(), writes_after_first);
}

#[tokio::test]
async fn test_vanished_price_is_purged_and_references_detached() {
    let server = MockServer::start().await;
    mount_all(&server, true, true, true).await;
    let (store, sync) = harness(&server);
    sync.synchronize(false).await.unwrap();

    let line = store.add_quote_line("web tier", "SKUC5X.JRTCKXETXF");

    // The next publication drops the on-demand row.
    server.reset().await;
    mount_all(&server, false, true, true).await;
    let stats = sync.synchronize(false).await.unwrap();

    assert!(store.price("SKUC5X.JRTCKXETXF").is_none());
    assert!(store.price("SKUC5X.HU7G6KETJZ").is_some());
    assert!(stats.purged >= 1);
    let line = store.quote_line(line).unwrap();
    assert!(line.price_code.is_none());

    // With the on-demand baseline gone the region's plan slice is
    // left alone rather than purged.
    assert!(store.price("plan-PLANSKU1.SKUC5X.RATE1").is_some());
}

#[tokio::test]
async fn test_region_filter_excludes_everything_else() {
    init_tracing();
    let server = MockServer::start().await;
    mount_all(&server, true, true, true).await;
    let store = Arc::new(MemoryStore::new());
    let config = SyncConfig {
        base_url: server.uri(),
        enabled_regions: "us-.*".to_string(),
        ..SyncConfig::default()
    };
    let sync = Synchronizer::new(config, store.clone()).unwrap();

    let stats = sync.synchronize(false).await.unwrap();
    assert_eq!(stats.prices, 0);
    assert!(store.price("SKUC5X.JRTCKXETXF").is_none());
    assert!(store.storage_price("eu-west-1-gp2").is_none());
}

#[tokio::test]
async fn test_missing_spot_feed_degrades_gracefully() {
    let server = MockServer::start().await;
    mount_all(&server, true, false, true).await;
    let (store, sync) = harness(&server);

    let stats = sync.synchronize(false).await.unwrap();
    assert!(store.price("SKUC5X.JRTCKXETXF").is_some());
    assert!(store.price("spot-eu-west-1-c5.xlarge-Linux").is_none());
    assert!(stats.prices > 0);
}

#[tokio::test]
async fn test_missing_savings_plan_feed_degrades_gracefully() {
    let server = MockServer::start().await;
    // The offer index advertises a savings-plan index, but the
    // endpoint is never mounted.
    mount_all(&server, true, true, false).await;
    let (store, sync) = harness(&server);

    let stats = sync.synchronize(false).await.unwrap();
    assert!(store.price("SKUC5X.JRTCKXETXF").is_some());
    assert!(store.price("plan-PLANSKU1.SKUC5X.RATE1").is_none());
    assert!(stats.prices > 0);
}

const TWO_REGION_COMPUTE_INDEX: &str = r#"{"regions": {
  "eu-west-1": {"regionCode": "eu-west-1", "currentVersionUrl": "/offers/compute/eu-west-1/index.csv"},
  "us-east-1": {"regionCode": "us-east-1", "currentVersionUrl": "/offers/compute/us-east-1/index.csv"}
}}"#;

#[tokio::test]
async fn test_failed_region_finishes_siblings_before_erroring() {
    let server = MockServer::start().await;
    mount(&server, "/offers/v1.0/index.json", OFFER_INDEX).await;
    mount(&server, "/pricing/block-storage.js", BLOCK_JSON).await;
    mount(&server, "/offers/compute/region_index.json", TWO_REGION_COMPUTE_INDEX).await;
    mount(&server, "/offers/compute/eu-west-1/index.csv", &compute_csv(true)).await;
    // The us-east-1 CSV 404s: the pass fails, but only after the
    // healthy region's task ran to completion.
    let (store, sync) = harness(&server);

    assert!(sync.synchronize(false).await.is_err());
    assert!(store.price("SKUC5X.JRTCKXETXF").is_some());
    assert!(store.price("SKUC5X.HU7G6KETJZ").is_some());
}

#[tokio::test]
async fn test_missing_mandatory_feed_fails_the_run() {
    let server = MockServer::start().await;
    // Only the offer index is served; the first regional feed 404s.
    mount(&server, "/offers/v1.0/index.json", OFFER_INDEX).await;
    mount(&server, "/pricing/block-storage.js", BLOCK_JSON).await;
    let (_store, sync) = harness(&server);

    assert!(sync.synchronize(false).await.is_err());
}

#[tokio::test]
async fn test_os_filter_narrows_compute_prices() {
    init_tracing();
    let server = MockServer::start().await;
    mount_all(&server, true, true, true).await;
    let store = Arc::new(MemoryStore::new());
    let config = SyncConfig {
        base_url: server.uri(),
        enabled_os: "windows".to_string(),
        ..SyncConfig::default()
    };
    let sync = Synchronizer::new(config, store.clone()).unwrap();

    sync.synchronize(false).await.unwrap();
    // Every compute row in the fixture is Linux.
    assert!(store.price("SKUC5X.JRTCKXETXF").is_none());
    // Database rows are not OS-gated.
    assert!(store.price("SKUDBR5.JRTCKXETXF").is_some());
}
