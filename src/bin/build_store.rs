//! Store builder binary: converts an XYZ text file into a paged octree store.
//!
//! Usage: cargo run --release --bin build_store -- --input <FILE> --output <DIR> [OPTIONS]
//!
//! Options:
//!   --input <FILE>    XYZ text file, `x y z [intensity]` per line
//!   --output <DIR>    Store directory (created or replaced)
//!   --bucket <N>      Maximum points per node (default: 10000)
//!   --swap-yz         Swap the Y and Z axes while reading
//!   --no-recenter     Keep the original coordinates
//!   --lz4             Compress node blobs
//!   --inspect <DIR>   Print the summary of an existing store and exit
//!
//! Output structure:
//!   <DIR>/
//!     meta.json       # Schema, bounds, counts
//!     octree.index    # Node table
//!     octree.bin      # Node point blobs in pre-order

use std::path::{Path, PathBuf};
use std::time::Instant;

use pointstream::core::Result;
use pointstream::dispatch_schema;
use pointstream::octree::{BuildConfig, DEFAULT_BUCKET_CAPACITY, OctreeBuilder};
use pointstream::point::source::xyz_has_intensity;
use pointstream::point::{PointRecord, Pos64, Pos64IShort, PrepareOptions, XyzSource};
use pointstream::store::{PagedStoreReader, StoreCompression, StoreWriter, read_schema};

fn main() {
    pointstream::core::logging::init();

    let args: Vec<String> = std::env::args().collect();

    if let Some(dir) = parse_str_arg(&args, "--inspect") {
        if let Err(e) = inspect(Path::new(&dir)) {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let (Some(input), Some(output)) = (parse_str_arg(&args, "--input"), parse_str_arg(&args, "--output")) else {
        eprintln!("usage: build_store --input <FILE> --output <DIR> [--bucket N] [--swap-yz] [--no-recenter] [--lz4]");
        std::process::exit(2);
    };

    let config = BuildConfig {
        bucket_capacity: parse_usize_arg(&args, "--bucket").unwrap_or(DEFAULT_BUCKET_CAPACITY),
        compression: if has_flag(&args, "--lz4") {
            StoreCompression::Lz4
        } else {
            StoreCompression::None
        },
    };
    let options = PrepareOptions {
        swap_yz: has_flag(&args, "--swap-yz"),
        recenter: !has_flag(&args, "--no-recenter"),
    };

    println!("=== Pointstream Store Builder ===");
    println!("Input:   {}", input);
    println!("Output:  {}", output);
    println!("Bucket:  {} points", config.bucket_capacity);
    println!("Codec:   {:?}", config.compression);
    println!();

    let input = PathBuf::from(input);
    let output = PathBuf::from(output);
    let result = xyz_has_intensity(&input).and_then(|intensity| {
        if intensity {
            build::<Pos64IShort>(&input, &output, &config, &options)
        } else {
            build::<Pos64>(&input, &output, &config, &options)
        }
    });

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn build<P: PointRecord>(input: &Path, output: &Path, config: &BuildConfig, options: &PrepareOptions) -> Result<()> {
    let start = Instant::now();
    let mut source = XyzSource::<P>::new(input);
    let builder = OctreeBuilder::new(config.clone());
    let (tree, offset) = builder.build_from_source(&mut source, options)?;

    let stats = tree.stats();
    let meta = StoreWriter::new(config.compression)
        .with_origin(offset)
        .write(&tree, output)?;

    println!("Schema:  {}", meta.schema);
    println!("Points:  {}", stats.point_count);
    println!("Nodes:   {} ({} leaves, depth {})", stats.node_count, stats.leaf_count, stats.depth);
    println!("Largest: {} points", stats.max_bucket);
    println!("Origin:  {:?}", meta.origin());
    println!("Done in {:.2?}", start.elapsed());
    Ok(())
}

fn inspect(dir: &Path) -> Result<()> {
    let schema = read_schema(dir)?;
    dispatch_schema!(schema, P => {
        let reader = PagedStoreReader::<P>::open(dir)?;
        let meta = reader.metadata();
        println!("Schema:   {}", meta.schema);
        println!("Points:   {}", meta.point_count);
        println!("Nodes:    {} (depth {})", meta.node_count, meta.depth);
        println!("Bucket:   {}", meta.bucket_capacity);
        println!("Codec:    {:?}", meta.compression);
        println!("Bounds:   {:?}", meta.bbox());
        println!("Origin:   {:?}", meta.origin());
    });
    Ok(())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
