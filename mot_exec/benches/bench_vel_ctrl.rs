//! # Velocity Controller Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::mot::{MotorVel, Twist2D};
use mot_lib::vel_ctrl::{DriveType, InputData, PidGains, VelCtrl, VelCtrlParams};
use util::module::State;

fn vel_ctrl_benchmark(c: &mut Criterion) {
    let gains = PidGains {
        kp: 0.8,
        ki: 0.2,
        kd: 0.01,
        tf: 0.05,
    };

    let input = InputData {
        cmd: Twist2D::new(0.3, 0.1, 0.5),
        meas_twist: Twist2D::new(0.25, 0.05, 0.4),
        meas_vel: MotorVel::new(6.0, -6.5, 1.0),
    };

    for drive_type in &[DriveType::Differential, DriveType::Omni] {
        let mut vel_ctrl = VelCtrl::default();
        vel_ctrl
            .init(VelCtrlParams {
                drive_type: *drive_type,
                left: gains,
                right: gains,
                back: Some(gains),
                vx: gains,
                vy: Some(gains),
                wz: gains,
                ..Default::default()
            })
            .unwrap();

        c.bench_function(&format!("vel_ctrl_proc_{:?}", drive_type), |b| {
            b.iter(|| vel_ctrl.proc(black_box(&input)).unwrap())
        });
    }
}

criterion_group!(benches, vel_ctrl_benchmark);
criterion_main!(benches);
