use oc_dcr::core::process_models::dcr::RelationType;
use oc_dcr::discovery::object_centric::oc_dcr::ActivityMapping;
use oc_dcr::{discover_oc_dcr, ocel, IndexLinkedOCEL, OCDCRDiscoveryOptions, OCEL};
use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

fn order_item_log() -> OCEL {
    ocel![
        events:
        ("Create Order", ["Order:1"]),
        ("Add Item", ["Item:1"]),
        ("Add Item", ["Item:2"]),
        ("Link Item to Order", ["Item:1", "Order:1"]),
        ("Link Item to Order", ["Item:2", "Order:1"]),
        ("Ship Order", ["Order:1"]),
        ("Create Order", ["Order:2"]),
        ("Add Item", ["Item:3"]),
        ("Link Item to Order", ["Item:3", "Order:2"]),
        ("Ship Order", ["Order:2"]),
    ]
}

fn order_item_options() -> OCDCRDiscoveryOptions {
    OCDCRDiscoveryOptions {
        spawn_mapping: HashMap::from([
            ("Order".to_string(), "Create Order".to_string()),
            ("Item".to_string(), "Add Item".to_string()),
        ]),
        activity_mapping: HashMap::from([
            (
                "Link Item to Order".to_string(),
                ActivityMapping::object("Item"),
            ),
            ("Ship Order".to_string(), ActivityMapping::object("Order")),
        ]),
        ..Default::default()
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    let (ocel, options) = match args.len() {
        1 => (order_item_log(), order_item_options()),
        3 => {
            let ocel: OCEL = serde_json::from_reader(BufReader::new(File::open(&args[1])?))?;
            let options = OCDCRDiscoveryOptions::from_json(&std::fs::read_to_string(&args[2])?)?;
            (ocel, options)
        }
        _ => {
            eprintln!(
                "Usage: {} [<path_to_ocel_json> <path_to_options_json>]",
                args[0]
            );
            std::process::exit(1);
        }
    };

    println!(
        "Linking OCEL with {} events and {} objects...",
        ocel.events.len(),
        ocel.objects.len()
    );
    let locel = IndexLinkedOCEL::from_ocel(ocel);

    println!("Discovering OC-DCR graph...");
    let graph = discover_oc_dcr(&locel, options)?;

    println!(
        "Discovered OC-DCR graph with {} events, {} objects and {} synchronizing relations.",
        graph.events().count(),
        graph.objects().len(),
        graph.sync_relations().count()
    );
    for relation_type in [
        RelationType::Condition,
        RelationType::Response,
        RelationType::Include,
        RelationType::Exclude,
    ] {
        let count = graph
            .get_all_relations()
            .filter(|r| r.relation_type == relation_type)
            .count();
        println!("  {relation_type:?}: {count}");
    }

    println!("{}", graph.to_template().to_json()?);
    Ok(())
}
