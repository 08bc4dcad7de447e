// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
use clap::Parser;
use nalgebra::{Isometry3, Matrix3, Vector3};
use tasks::{
    Body, CoMTask, ContactId, ContactObjective, ContactTask, ControllerConfig, Joint, JointType,
    MultiBody, MultiBodyConfig, PostureTask, SolverData, Task, TasksResult, UnilateralContact,
};

/// An example showing how to assemble the objective of a walker standing on the ground.
/// It prints the column range and the norm of every objective block.
#[derive(Parser, Debug)]
#[clap(author, version, name = "print_objective")]
struct CommandLineArguments {
    /// TOML file with a `foot` friction entry and a `com` task entry, see demos/walker.toml
    pub config: String,
    /// Number of control ticks
    #[clap(short, long, default_value_t = 3)]
    pub ticks: usize,
}

fn main() -> TasksResult<()> {
    let args = CommandLineArguments::parse();
    let config = ControllerConfig::from_file(&args.config)?;
    let robots = vec![
        MultiBody::new(
            "walker",
            vec![
                Body::new("torso", 20.),
                Body::new("leg", 4.),
                Body::new("foot", 1.),
            ],
            vec![
                Joint::new("root", JointType::Free),
                Joint::new("hip", JointType::Revolute),
                Joint::new("ankle", JointType::Revolute),
            ],
            vec![None, Some(0), Some(1)],
        )?,
        MultiBody::new(
            "ground",
            vec![Body::new("floor", 0.)],
            vec![Joint::new("root", JointType::Fixed)],
            vec![None],
        )?,
    ];

    let friction = config.friction("foot")?;
    let contact = UnilateralContact::new(
        ContactId::new(0, 1, 2, 0, 0),
        vec![Vector3::new(0.1, 0., 0.), Vector3::new(-0.1, 0., 0.)],
        &Matrix3::identity(),
        Isometry3::identity(),
        friction.nr_gen,
        friction.mu,
        None,
    )?;
    let id = contact.contact_id();
    let data = SolverData::new(&robots, vec![contact], vec![], &[])?;

    let com = CoMTask::new(&robots, 0, Vector3::new(0., 0., 1.))?;
    let mut com_task = config.task("com")?.set_point_task(&robots, 0, com)?;
    let posture = MultiBodyConfig::new(&robots[0]).q;
    let mut posture_task = PostureTask::new(&robots, 0, posture, 1., 1.)?;
    let mut contact_task = ContactTask::new(id, ContactObjective::Max, 1e-3);
    let mut objective: Vec<&mut dyn Task> =
        vec![&mut com_task, &mut posture_task, &mut contact_task];
    for task in objective.iter_mut() {
        task.update_nr_vars(&robots, &data);
    }

    let mut configs: Vec<_> = robots.iter().map(MultiBodyConfig::new).collect();
    for i in 0..3 {
        configs[0].com_jac[(i, 3 + i)] = 1.;
    }
    for tick in 0..args.ticks {
        // the model would update the configuration here
        configs[0].com = Vector3::new(0.01 * tick as f64, 0., 0.95);
        println!("tick {} with {} variables", tick, data.nr_vars());
        for task in objective.iter_mut() {
            task.update(&robots, &configs, &data);
            let (begin, end) = task.begin();
            println!(
                "  [{}, {}[ |Q| = {:.3} |C| = {:.3}",
                begin,
                end,
                task.q().norm(),
                task.c().norm()
            );
        }
    }
    Ok(())
}
