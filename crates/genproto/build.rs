use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = "src/gen";

    fs::create_dir_all(out_dir)?;

    tonic_prost_build::configure()
        .build_server(true)
        .out_dir(out_dir)
        .compile_protos(
            &[
                // order proto
                "../../proto/order/common.proto",
                "../../proto/order/query.proto",
                "../../proto/order/command.proto",
                // product proto, client side only
                "../../proto/product/common.proto",
                "../../proto/product/query.proto",
            ],
            &["../../proto"],
        )?;

    println!("cargo:rerun-if-changed=../../proto");

    Ok(())
}
