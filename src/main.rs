use anyhow::{bail, Context};
use rmaps_explicit::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: rmaps-explicit [num_procs] [num_nodes] [slots_per_node]

  num_procs       processes to map, 0 maps as many as the layout provides (default: 0)
  num_nodes       nodes in the simulated allocation (default: 1)
  slots_per_node  slots of every node (default: number of PUs of the topology)

environment:
  RMAPS_EXPLICIT_LAYOUT         layout string, e.g. 'MPI[core][0,1,2,3]' (required)
  RMAPS_EXPLICIT_TOPOLOGY       synthetic node topology, e.g. 'package:2 core:4 pu:2' (default: host)
  RMAPS_EXPLICIT_CPUS_PER_RANK  PUs every rank needs with the spread policy (default: 1)
  RMAPS_EXPLICIT_SHOW_HELP      print diagnostics (default: true)";

fn arg(args: &[String], i: usize, name: &str) -> anyhow::Result<Option<usize>> {
    match args.get(i) {
        Some(value) => {
            let n = value
                .parse()
                .with_context(|| format!("invalid {}: {:?}\n\n{}", name, value, USAGE))?;
            Ok(Some(n))
        }
        None => Ok(None),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{}", USAGE);
        return Ok(());
    }
    if args.len() > 3 {
        bail!("too many arguments\n\n{}", USAGE);
    }

    let config = config();

    let topology = match &config.topology {
        Some(desc) => SyntheticTopology::new(desc)?,
        None => SyntheticTopology::from_host().context("failed to read the host topology")?,
    };
    let num_procs = arg(&args, 0, "num_procs")?.unwrap_or(0);
    let num_nodes = arg(&args, 1, "num_nodes")?.unwrap_or(1);
    let slots = arg(&args, 2, "slots_per_node")?.unwrap_or(topology.num_pus());

    let topology: Arc<dyn Topology> = Arc::new(topology);
    let mut cluster = Cluster::new();
    for i in 0..num_nodes {
        cluster.add_node(Node::new(format!("node{}", i), slots).with_topology(topology.clone()));
    }

    let mut registry = MapperRegistry::new();
    registry.register(Box::new(ExplicitMapper::from_config(config)?));

    let mut job = Job::new(1).with_app("app", num_procs);
    let result = registry
        .map_job(&mut cluster, &mut job)
        .and_then(|_| registry.assign_locations(&cluster, &mut job));
    if let Err(e) = result {
        if e.is_silent() {
            std::process::exit(1);
        }
        return Err(e).context("mapping failed");
    }

    println!(
        "job {} mapped {} procs {}{}",
        job.jobid,
        job.num_procs,
        job.map
            .mapping
            .policy
            .map_or("", |level| level.mapping_name()),
        if job.flags.oversubscribed {
            " (oversubscribed)"
        } else {
            ""
        }
    );
    for node_idx in &job.map.nodes {
        let node = cluster.node(*node_idx);
        println!(
            "  {} slots {}/{} procs {}",
            node.name, node.slots_inuse, node.slots, node.num_procs
        );
        for proc in job.procs_on(*node_idx) {
            match &proc.locale {
                Some(locale) => println!(
                    "    rank {} -> {} cpus {}",
                    proc.name.vpid,
                    locale,
                    locale.cpuset_string()
                ),
                None => println!("    rank {} -> unbound", proc.name.vpid),
            }
        }
    }
    Ok(())
}
