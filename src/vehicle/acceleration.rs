use crate::strategy::StrategyParams;

/// The longitudinal control law of a vehicle: the intelligent driver model,
/// with its output clamped to what the vehicle can physically do.
#[derive(Clone, Copy, Debug)]
pub struct AccelerationModel {
    /// The desired speed in m/s, including any per-vehicle adjustment.
    desired_speed: f64,
    /// The maximum acceleration in m/s<sup>2</sup>.
    max_acc: f64,
    /// The maximum deceleration, a positive number in m/s<sup>2</sup>.
    max_brake: f64,
    /// The minimum gap to maintain at standstill in m.
    min_gap: f64,
    /// The desired time headway in s.
    headway: f64,
}

impl AccelerationModel {
    /// Creates an acceleration model for a strategy.
    ///
    /// # Parameters
    /// * `params` - The strategy's control parameters
    /// * `vel_adj` - The desired speed adjustment factor
    pub fn new(params: &StrategyParams, vel_adj: f64) -> Self {
        Self {
            desired_speed: vel_adj * params.desired_speed,
            max_acc: params.max_acc,
            max_brake: params.max_brake,
            min_gap: params.min_gap,
            headway: params.reaction_time,
        }
    }

    /// The speed the vehicle settles at on an empty track.
    pub fn desired_speed(&self) -> f64 {
        self.desired_speed
    }

    /// Calculates the acceleration with nothing ahead.
    pub fn free_road(&self, my_vel: f64) -> f64 {
        self.clamp(self.max_acc * (1.0 - self.speed_term(my_vel)))
    }

    /// Calculates the acceleration needed to follow the vehicle ahead.
    ///
    /// # Parameters
    /// * `net_dist` - The bumper-to-bumper distance to the vehicle ahead in m.
    /// * `my_vel` - The velocity of the simulated vehicle (m/s).
    /// * `their_vel` - The vehicle ahead's velocity (m/s).
    pub fn follow_vehicle(&self, net_dist: f64, my_vel: f64, their_vel: f64) -> f64 {
        let net_dist = if net_dist.is_finite() && net_dist > 0.0 {
            net_dist
        } else {
            self.min_gap
        };

        let appr = my_vel - their_vel;
        let factor = 1. / (2. * (self.max_acc * self.max_brake).sqrt());
        let dynamic = f64::max(0.0, my_vel * self.headway + my_vel * appr * factor);
        let ss = self.min_gap + dynamic;
        let term = ss / net_dist;
        self.clamp(self.max_acc * (1. - self.speed_term(my_vel) - term * term))
    }

    fn speed_term(&self, my_vel: f64) -> f64 {
        (my_vel / self.desired_speed).powi(4)
    }

    fn clamp(&self, acc: f64) -> f64 {
        acc.clamp(-self.max_brake, self.max_acc)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::strategy::StrategyTable;
    use assert_approx_eq::assert_approx_eq;

    fn balanced() -> AccelerationModel {
        AccelerationModel::new(&StrategyTable::default().balanced, 1.0)
    }

    #[test]
    fn free_road_settles_at_desired_speed() {
        let acc = balanced();
        assert_approx_eq!(acc.free_road(0.0), 3.0);
        assert_approx_eq!(acc.free_road(18.0), 0.0);
        assert!(acc.free_road(20.0) < 0.0);
        assert_approx_eq!(acc.free_road(100.0), -6.0);
    }

    #[test]
    fn stalled_leader_within_min_gap_brakes() {
        let acc = balanced();
        for vel in [0.0, 0.5, 5.0, 18.0] {
            for gap in [0.1, 1.0, 2.0] {
                assert!(acc.follow_vehicle(gap, vel, 0.0) <= 0.0);
            }
        }
        assert_approx_eq!(acc.follow_vehicle(1.0, 18.0, 0.0), -6.0);
    }

    #[test]
    fn degenerate_gap_uses_min_gap() {
        let acc = balanced();
        let at_min_gap = acc.follow_vehicle(2.0, 3.0, 3.0);
        assert_approx_eq!(acc.follow_vehicle(0.0, 3.0, 3.0), at_min_gap);
        assert_approx_eq!(acc.follow_vehicle(-4.0, 3.0, 3.0), at_min_gap);
        assert_approx_eq!(acc.follow_vehicle(f64::NAN, 3.0, 3.0), at_min_gap);
    }

    #[test]
    fn distant_leader_barely_matters() {
        let acc = balanced();
        let free = acc.free_road(10.0);
        assert_approx_eq!(acc.follow_vehicle(1000.0, 10.0, 10.0), free, 0.01);
    }

    #[test]
    fn speed_adjustment_scales_desired_speed() {
        let params = StrategyTable::default().balanced;
        let acc = AccelerationModel::new(&params, 1.1);
        assert_approx_eq!(acc.desired_speed(), 19.8);
        assert_approx_eq!(acc.free_road(19.8), 0.0);
    }
}
