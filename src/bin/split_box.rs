use env_logger::Env;
use pmesh_split::{
    mesh::{test_meshes::box_mesh, FieldKind, SolField},
    partition::{HilbertPartitioner, RcmPartitioner},
    Group, ParMesh, Result, SplitParams,
};

pub fn init_log(level: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    init_log("info");

    // optional parameter file
    let params = match std::env::args().nth(1) {
        Some(fname) => SplitParams::from_json_file(fname)?,
        None => SplitParams::default().with_target_size(5000),
    };

    let n = 21;
    let mut msh = box_mesh(1.0, n, 1.0, n, 1.0, n)?;
    msh.tag_boundary(1)?;
    let values = msh
        .points()
        .map(|p| 0.1 + p.coords[0] * p.coords[0])
        .collect::<Vec<_>>();
    let field = SolField::new(FieldKind::Scalar, &values)?;

    for rcm in [false, true] {
        let group = Group::new(msh.clone(), Some(field.clone()))?;
        let mut pmsh = ParMesh::new(group, params.clone());
        let info = if rcm {
            pmsh.split_groups(&RcmPartitioner)?
        } else {
            pmsh.split_groups(&HilbertPartitioner)?
        };
        info.print_summary();
        pmsh.check_communicators()?;
        println!("{}", info.to_json()?);
    }

    Ok(())
}
