//! Whole-circuit tests driving the three engines end to end.

use std::f64::consts::PI;

use voltaic_core::{Analysis, Netlist, voltage};
use voltaic_devices::{
    Bjt, Capacitor, CurrentSource, Diode, Inductor, Resistor, VoltageSource, Waveform,
};
use voltaic_solver::{
    Ac, AcConfig, Dc, FrequencySweep, TranConfig, Transient,
};

/// Two 1k resistors from a 1 V source: the midpoint sits at 0.5 V.
#[test]
fn resistive_divider_dc() {
    let mut net = Netlist::new();
    let top = net.node("top");
    let mid = net.node("mid");
    let gnd = net.node("0");
    net.add(VoltageSource::dc("V1", top, gnd, 1.0));
    net.add(Resistor::new("R1", top, mid, 1e3));
    net.add(Resistor::new("R2", mid, gnd, 1e3));

    let x = Dc::new().run(&mut net, None).unwrap();
    assert!((voltage(&x, mid) - 0.5).abs() < 1e-6);
}

/// Device insertion order must not change the solution beyond rounding.
#[test]
fn stamping_order_does_not_matter() {
    let solve = |swap: bool| {
        let mut net = Netlist::new();
        let top = net.node("top");
        let mid = net.node("mid");
        let gnd = net.node("0");
        if swap {
            net.add(Resistor::new("R2", mid, gnd, 2.2e3));
            net.add(Resistor::new("R1", top, mid, 1e3));
            net.add(VoltageSource::dc("V1", top, gnd, 1.0));
        } else {
            net.add(VoltageSource::dc("V1", top, gnd, 1.0));
            net.add(Resistor::new("R1", top, mid, 1e3));
            net.add(Resistor::new("R2", mid, gnd, 2.2e3));
        }
        Dc::new().run(&mut net, None).unwrap()
    };

    let a = solve(false);
    let b = solve(true);
    for i in 0..a.len() {
        assert!((a[i] - b[i]).abs() < 1e-12, "order changed unknown {i}");
    }
}

/// 1 mA into a diode: Vd = N*Vt*ln(1 + I/Is), about 0.714 V at 300 K.
#[test]
fn diode_forward_bias_dc() {
    let mut net = Netlist::new();
    let anode = net.node("anode");
    let gnd = net.node("0");
    net.add(CurrentSource::dc("I1", gnd, anode, 1e-3));
    net.add(Diode::new("D1", anode, gnd));

    let x = Dc::new().run(&mut net, None).unwrap();
    let vd = voltage(&x, anode);
    assert!((vd - 0.7143).abs() < 1e-3, "Vd = {vd}");
}

/// A two-transistor mirror copies the reference current into the load
/// branch, short of the base-current error `2/(Bf + 2)`.
#[test]
fn bjt_current_mirror_dc() {
    let mut net = Netlist::new();
    let vcc = net.node("vcc");
    let reference = net.node("ref");
    let out = net.node("out");
    let gnd = net.node("0");
    net.add(VoltageSource::dc("V1", vcc, gnd, 5.0));
    net.add(CurrentSource::dc("I1", gnd, reference, 1e-3));
    net.add(Resistor::new("R1", vcc, out, 1e3));
    // Q1 is diode-connected; Q2 mirrors its base-emitter voltage
    net.add(Bjt::npn("Q1", reference, reference, gnd));
    net.add(Bjt::npn("Q2", out, reference, gnd));

    let x = Dc::new().run(&mut net, None).unwrap();

    // If = Iref / (1 + 2/Bf), so V(out) = 5 - 1k * If
    let mirrored = 1e-3 / (1.0 + 2.0 / 100.0);
    let expected = 5.0 - 1e3 * mirrored;
    let v_out = voltage(&x, out);
    assert!(
        (v_out - expected).abs() < 0.01,
        "V(out) = {v_out} (expected about {expected})"
    );
    // The reference node sits one forward drop above ground; with
    // Is = 1e-16 that is Vt*ln(If/Is), about 0.77 V
    let v_ref = voltage(&x, reference);
    assert!(v_ref > 0.72 && v_ref < 0.83, "V(ref) = {v_ref}");
}

fn rc_lowpass() -> (Netlist, voltaic_core::NodeId) {
    let mut net = Netlist::new();
    let inp = net.node("in");
    let out = net.node("out");
    let gnd = net.node("0");
    net.add(VoltageSource::dc("V1", inp, gnd, 0.0).with_ac(1.0, 0.0));
    net.add(Resistor::new("R1", inp, out, 1e3));
    net.add(Capacitor::new("C1", out, gnd, 1e-9));
    (net, out)
}

/// At the corner frequency the RC low-pass sits at -3 dB and -45
/// degrees.
#[test]
fn rc_lowpass_corner_frequency_ac() {
    let (mut net, out) = rc_lowpass();
    let fc = 1.0 / (2.0 * PI * 1e3 * 1e-9); // about 159.155 kHz

    let solution = Ac::new(FrequencySweep::linear(fc, fc, 1))
        .run(&mut net, None)
        .unwrap();
    assert!(solution.failed.is_empty());

    let v = solution.voltage(0, out);
    let magnitude = v.norm();
    let phase_deg = v.arg().to_degrees();

    assert!(
        (magnitude - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3,
        "|V(out)| = {magnitude}"
    );
    assert!((phase_deg + 45.0).abs() < 0.5, "phase = {phase_deg} deg");
}

/// Scaling the AC source scales the whole solution: no nonlinear path.
#[test]
fn ac_solution_is_linear_in_the_source() {
    let run = |mag: f64| {
        let mut net = Netlist::new();
        let inp = net.node("in");
        let out = net.node("out");
        let gnd = net.node("0");
        net.add(VoltageSource::dc("V1", inp, gnd, 0.0).with_ac(mag, 0.0));
        net.add(Resistor::new("R1", inp, out, 1e3));
        net.add(Capacitor::new("C1", out, gnd, 1e-9));
        Ac::new(FrequencySweep::logarithmic(1e3, 1e6, 7))
            .run(&mut net, None)
            .unwrap()
    };

    let base = run(1.0);
    let scaled = run(2.5);
    for k in 0..base.freqs.len() {
        for i in 0..base.data.ncols() {
            let expected = base.data[(k, i)] * 2.5;
            let got = scaled.data[(k, i)];
            assert!(
                (got - expected).norm() <= 1e-12 * expected.norm().max(1e-12),
                "nonlinear path at frequency {k}, unknown {i}"
            );
        }
    }
}

/// The diode's small-signal resistance at 1 mA is Vt/Id, so a 1 mA AC
/// drive produces exactly one thermal voltage across it.
#[test]
fn diode_small_signal_resistance_ac() {
    let mut net = Netlist::new();
    let anode = net.node("anode");
    let gnd = net.node("0");
    net.add(CurrentSource::dc("I1", gnd, anode, 1e-3).with_ac(1e-3, 0.0));
    net.add(Diode::new("D1", anode, gnd));

    let solution = Ac::new(FrequencySweep::linear(1e3, 1e3, 1))
        .run(&mut net, None)
        .unwrap();
    let v = solution.voltage(0, anode).norm();
    let vt = voltaic_core::consts::thermal_voltage(300.0);
    assert!((v - vt).abs() / vt < 2e-3, "|V| = {v}, Vt = {vt}");
}

/// A floating sub-network is only solvable thanks to Gmin; with Gmin
/// disabled every frequency goes singular but the sweep still finishes.
#[test]
fn ac_sweep_survives_a_singular_network() {
    let build = || {
        let mut net = Netlist::new();
        let inp = net.node("in");
        let out = net.node("out");
        let gnd = net.node("0");
        let float_a = net.node("float_a");
        let float_b = net.node("float_b");
        net.add(VoltageSource::dc("V1", inp, gnd, 0.0).with_ac(1.0, 0.0));
        net.add(Resistor::new("R1", inp, out, 1e3));
        net.add(Resistor::new("R2", out, gnd, 1e3));
        // Island with no path to the rest of the circuit
        net.add(Resistor::new("R3", float_a, float_b, 1e3));
        net
    };
    let sweep = FrequencySweep::linear(1e3, 1e5, 3);

    // With the default gmin the island is pinned and everything solves
    let mut net = build();
    let x0 = nalgebra_zeros(net.unknown_count(Analysis::Dc));
    let ok = Ac::new(sweep).run(&mut net, Some(&x0)).unwrap();
    assert!(ok.failed.is_empty());
    assert!(ok.data.iter().all(|v| v.norm().is_finite()));

    // Without gmin each frequency reports the singular system, stores
    // zeros, and the sweep continues to the end
    let mut net = build();
    let ac = Ac::with_config(
        sweep,
        AcConfig {
            gmin: 0.0,
            ..AcConfig::default()
        },
    );
    let bad = ac.run(&mut net, Some(&x0)).unwrap();
    assert_eq!(bad.freqs.len(), 3, "sweep must not abort");
    assert!(!bad.failed.is_empty());
    for &k in &bad.failed {
        for i in 0..bad.data.ncols() {
            assert_eq!(bad.data[(k, i)].norm(), 0.0);
        }
    }
}

fn nalgebra_zeros(len: usize) -> nalgebra::DVector<f64> {
    nalgebra::DVector::zeros(len)
}

/// RC charging toward a stepped source follows 1 - exp(-t/tau).
#[test]
fn rc_charging_transient() {
    let mut net = Netlist::new();
    let inp = net.node("in");
    let out = net.node("out");
    let gnd = net.node("0");
    net.add(VoltageSource::new(
        "V1",
        inp,
        gnd,
        Waveform::pulse(0.0, 5.0, 0.0, 1e-6, 1e-6, 1.0, 0.0),
    ));
    net.add(Resistor::new("R1", inp, out, 1e3));
    net.add(Capacitor::new("C1", out, gnd, 1e-6));

    // tau = 1 ms; run one time constant
    let result = Transient::new(1e-3, 1e-5).run(&mut net, None).unwrap();

    assert!(result.final_time() >= 1e-3);
    let v_end = voltage(&result.points.last().unwrap().solution, out);
    let expected = 5.0 * (1.0 - (-1.0f64).exp());
    assert!(
        (v_end - expected).abs() < 0.05,
        "V(out) at tau = {v_end} (expected about {expected})"
    );
}

/// RL rise: the inductor current follows 1 - exp(-t/tau) and lives in
/// the auxiliary row of the transient solution.
#[test]
fn rl_current_rise_transient() {
    let mut net = Netlist::new();
    let inp = net.node("in");
    let out = net.node("out");
    let gnd = net.node("0");
    net.add(VoltageSource::new(
        "V1",
        inp,
        gnd,
        Waveform::pulse(0.0, 1.0, 0.0, 1e-9, 1e-9, 1.0, 0.0),
    ));
    net.add(Resistor::new("R1", inp, out, 1e3));
    let l1 = net.add(Inductor::new("L1", out, gnd, 1e-3));
    let aux_row = net.aux_map(Analysis::Tran)[l1].unwrap();

    // tau = L/R = 1 us; run five time constants
    let result = Transient::new(5e-6, 5e-8).run(&mut net, None).unwrap();

    let x_end = &result.points.last().unwrap().solution;
    let i_end = voltaic_core::unknown(x_end, aux_row);
    let expected = 1e-3 * (1.0 - (-5.0f64).exp());
    assert!(
        (i_end - expected).abs() < 2e-5,
        "I(L1) = {i_end} (expected about {expected})"
    );
}

/// Half-wave rectifier over five periods: the load never swings
/// negative and peaks one diode drop below the source.
#[test]
fn half_wave_rectifier_transient() {
    let mut net = Netlist::new();
    let inp = net.node("in");
    let out = net.node("out");
    let gnd = net.node("0");
    net.add(VoltageSource::new(
        "V1",
        inp,
        gnd,
        Waveform::sine(0.0, 1.0, 1e3),
    ));
    net.add(Diode::new("D1", inp, out));
    net.add(Resistor::new("R1", out, gnd, 1e3));

    let result = Transient::new(5e-3, 2e-6).run(&mut net, None).unwrap();
    assert!(result.final_time() >= 5e-3);

    // Committed history is strictly increasing in time: rolled-back
    // steps leave no trace
    for pair in result.points.windows(2) {
        assert!(pair[1].time > pair[0].time);
    }

    let vout = result.voltages(out);
    let peak = vout.iter().cloned().fold(f64::MIN, f64::max);
    let floor = vout.iter().cloned().fold(f64::MAX, f64::min);

    assert!(floor >= -1e-6, "load went negative: {floor}");
    // At the 1 V peak the diode drops about 0.685 V into 1k
    assert!(
        (peak - 0.315).abs() < 0.02,
        "peak = {peak} (expected about 0.315)"
    );
}

/// Driving a stiff diode with a 1 ns edge forces the engine to reject
/// at least one step and shrink dt, yet the run still completes.
#[test]
fn transient_step_retry_on_stiff_edge() {
    let mut net = Netlist::new();
    let inp = net.node("in");
    let out = net.node("out");
    let gnd = net.node("0");
    net.add(VoltageSource::new(
        "V1",
        inp,
        gnd,
        Waveform::pulse(0.0, 1.0, 0.0, 1e-9, 1e-9, 1.0, 0.0),
    ));
    net.add(Diode::new("D1", inp, out));
    net.add(Resistor::new("R1", out, gnd, 1e3));

    // A tight iteration cap makes the turn-on genuinely hard to step
    // through at full stride
    let config = TranConfig {
        max_iterations: 3,
        ..TranConfig::default()
    };
    let result = Transient::with_config(5e-9, 1e-9, config)
        .run(&mut net, None)
        .unwrap();

    assert!(result.final_time() >= 5e-9, "t = {}", result.final_time());
    assert!(
        result.step_reductions >= 1,
        "expected at least one dt reduction (rejected = {}, reductions = {})",
        result.rejected_steps,
        result.step_reductions
    );
    assert!(result.min_step_used < 1e-9);

    for pair in result.points.windows(2) {
        assert!(pair[1].time > pair[0].time);
    }
}

/// The sparse and dense paths agree on a transient run too.
#[test]
fn sparse_transient_matches_dense() {
    let build = || {
        let mut net = Netlist::new();
        let inp = net.node("in");
        let out = net.node("out");
        let gnd = net.node("0");
        net.add(VoltageSource::new(
            "V1",
            inp,
            gnd,
            Waveform::pulse(0.0, 2.0, 0.0, 1e-7, 1e-7, 1.0, 0.0),
        ));
        net.add(Resistor::new("R1", inp, out, 1e3));
        net.add(Capacitor::new("C1", out, gnd, 1e-8));
        net
    };

    let dense = Transient::new(2e-5, 5e-7).run(&mut build(), None).unwrap();
    let config = TranConfig {
        is_sparse: true,
        ..TranConfig::default()
    };
    let sparse = Transient::with_config(2e-5, 5e-7, config)
        .run(&mut build(), None)
        .unwrap();

    assert_eq!(dense.points.len(), sparse.points.len());
    let out = dense.points.len() - 1;
    let vd = dense.points[out].solution[1];
    let vs = sparse.points[out].solution[1];
    assert!((vd - vs).abs() < 1e-9, "dense {vd} vs sparse {vs}");
}
