//! digitalSTROM domain enumerations.
//!
//! Numeric values follow ds-basics and the vDC API properties
//! documents; they appear on the wire and in persisted state, so they
//! are part of the external contract.

/// Declares a fieldless enum with explicit discriminants plus `i64`
/// conversions for property and persistence encoding.
macro_rules! int_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            $vis fn from_i64(value: i64) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> i64 {
                value as i64
            }
        }
    };
}

int_enum! {
    /// dS application groups (colour groups).
    pub enum ColorGroup {
        /// Lights.
        Yellow = 1,
        /// Blinds / shades.
        Grey = 2,
        Heating = 3,
        /// Audio.
        Cyan = 4,
        /// Video.
        Magenta = 5,
        /// Security (not directly group-addressable).
        Red = 6,
        /// Access (not directly group-addressable).
        Green = 7,
        /// Joker / configurable.
        Black = 8,
        Cooling = 9,
        Ventilation = 10,
        Window = 11,
        Recirculation = 12,
        TemperatureControl = 48,
        ApartmentVentilation = 64,
        /// Single device without a fixed group id.
        White = 255,
    }
}

int_enum! {
    /// Standard output channel type ids. Ids 0-191 are reserved for
    /// standard types, 192-239 for device-specific channels (kept as
    /// raw integers where no variant exists).
    pub enum OutputChannelType {
        Default = 0,
        Brightness = 1,
        Hue = 2,
        Saturation = 3,
        ColorTemperature = 4,
        CieX = 5,
        CieY = 6,
        ShadePositionOutside = 11,
        ShadePositionIndoor = 12,
        ShadeOpeningAngleOutside = 13,
        ShadeOpeningAngleIndoor = 14,
        Transparency = 15,
        HeatingPower = 21,
        HeatingValve = 22,
        CoolingCapacity = 23,
        CoolingValve = 24,
        AirFlowIntensity = 25,
        AirFlowDirection = 26,
        AirFlapPosition = 27,
        AirLouverPosition = 28,
        AirLouverAuto = 29,
        AirFlowAuto = 30,
        AudioVolume = 41,
        AudioBass = 42,
        AudioTreble = 43,
        AudioBalance = 44,
        WaterTemperature = 51,
        WaterFlow = 52,
        PowerState = 53,
        WindSpeedRate = 54,
        PowerLevel = 55,
    }
}

int_enum! {
    /// Functional type of a device output.
    pub enum OutputFunction {
        OnOff = 0,
        Dimmer = 1,
        Positional = 2,
        DimmerColorTemp = 3,
        FullColorDimmer = 4,
        Bipolar = 5,
        InternallyControlled = 6,
    }
}

int_enum! {
    pub enum OutputMode {
        Disabled = 0,
        Binary = 1,
        Gradual = 2,
        Default = 127,
    }
}

int_enum! {
    pub enum OutputUsage {
        Undefined = 0,
        Room = 1,
        Outdoors = 2,
        User = 3,
    }
}

int_enum! {
    /// Physical sensor type ids (vDC API numbering).
    pub enum SensorType {
        None = 0,
        Temperature = 1,
        Humidity = 2,
        Illumination = 3,
        SupplyVoltage = 4,
        CoConcentration = 5,
        RadonActivity = 6,
        GasType = 7,
        ParticlesPm10 = 8,
        ParticlesPm2_5 = 9,
        ParticlesPm1 = 10,
        RoomOperatingPanel = 11,
        FanSpeed = 12,
        WindSpeed = 13,
        ActivePower = 14,
        ElectricCurrent = 15,
        EnergyMeter = 16,
        ApparentPower = 17,
        AirPressure = 18,
        WindDirection = 19,
        SoundPressureLevel = 20,
        Precipitation = 21,
        Co2Concentration = 22,
        WindGustSpeed = 23,
        WindGustDirection = 24,
        GeneratedActivePower = 25,
        GeneratedEnergy = 26,
        WaterQuantity = 27,
        WaterFlowRate = 28,
    }
}

int_enum! {
    pub enum SensorUsage {
        Undefined = 0,
        Room = 1,
        Outdoor = 2,
        UserInteraction = 3,
        DeviceLevel = 4,
        DeviceLastRun = 5,
        DeviceAverage = 6,
    }
}

int_enum! {
    /// Binary input sensor functions.
    pub enum BinaryInputType {
        Generic = 0,
        Presence = 1,
        Brightness = 2,
        PresenceInDarkness = 3,
        Twilight = 4,
        Motion = 5,
        MotionInDarkness = 6,
        Smoke = 7,
        Wind = 8,
        Rain = 9,
        SunRadiation = 10,
        Thermostat = 11,
        BatteryLow = 12,
        WindowOpen = 13,
        DoorOpen = 14,
        WindowTilted = 15,
        GarageDoorOpen = 16,
        SunProtection = 17,
        Frost = 18,
        HeatingSystemEnabled = 19,
        HeatingChangeOver = 20,
        Initialization = 21,
        Malfunction = 22,
        Service = 23,
    }
}

int_enum! {
    pub enum BinaryInputUsage {
        Undefined = 0,
        RoomClimate = 1,
        OutdoorClimate = 2,
        ClimateSetting = 3,
    }
}

int_enum! {
    /// Click event types generated by pushbutton inputs.
    pub enum ButtonClickType {
        Tip1x = 0,
        Tip2x = 1,
        Tip3x = 2,
        Tip4x = 3,
        HoldStart = 4,
        HoldRepeat = 5,
        HoldEnd = 6,
        Click1x = 7,
        Click2x = 8,
        Click3x = 9,
        ShortLong = 10,
        LocalOff = 11,
        LocalOn = 12,
        ShortShortLong = 13,
        LocalStop = 14,
        LocalDim = 15,
        Idle = 255,
    }
}

int_enum! {
    pub enum ButtonType {
        Undefined = 0,
        SinglePushbutton = 1,
        TwoWayPushbutton = 2,
        FourWayNavigation = 3,
        FourWayWithCenter = 4,
        EightWayWithCenter = 5,
        OnOffSwitch = 6,
    }
}

int_enum! {
    /// Element identifier within a multi-contact button.
    pub enum ButtonElementId {
        Center = 0,
        Down = 1,
        Up = 2,
        Left = 3,
        Right = 4,
        UpperLeft = 5,
        LowerLeft = 6,
        UpperRight = 7,
        LowerRight = 8,
    }
}

int_enum! {
    /// Logical function of a button (LTNUM lower 4 bits).
    pub enum ButtonFunction {
        Device = 0,
        Area1 = 1,
        Area2 = 2,
        Area3 = 3,
        Area4 = 4,
        Room = 5,
        Extended1 = 6,
        Extended2 = 7,
        Extended3 = 8,
        Extended4 = 9,
        ExtendedArea1 = 10,
        ExtendedArea2 = 11,
        ExtendedArea3 = 12,
        ExtendedArea4 = 13,
        Apartment = 14,
        App = 15,
    }
}

int_enum! {
    /// Button input mode (LTMODE register).
    pub enum ButtonMode {
        Standard = 0,
        Turbo = 1,
        Presence = 2,
        TwoWayUpPaired1 = 5,
        TwoWayUpPaired2 = 6,
        TwoWayUpPaired3 = 7,
        TwoWayUpPaired4 = 8,
        TwoWayDownPaired1 = 9,
        TwoWayDownPaired2 = 10,
        TwoWayDownPaired3 = 11,
        TwoWayDownPaired4 = 12,
    }
}

int_enum! {
    /// How a direct button action applies its scene.
    pub enum ActionMode {
        Normal = 0,
        Force = 1,
        Undo = 2,
    }
}

int_enum! {
    /// Error status of an input (button, binary, sensor).
    pub enum InputError {
        Ok = 0,
        OpenCircuit = 1,
        ShortCircuit = 2,
        BusConnection = 4,
        LowBattery = 5,
        OtherError = 6,
    }
}

int_enum! {
    /// Error status of an output.
    pub enum OutputError {
        Ok = 0,
        LampBroken = 1,
        ShortCircuit = 2,
        Overload = 3,
        BusConnection = 4,
        LowBattery = 5,
        OtherError = 6,
    }
}

int_enum! {
    /// Transition effect when a scene is invoked.
    pub enum SceneEffect {
        None = 0,
        Smooth = 1,
        Slow = 2,
        VerySlow = 3,
        Alert = 4,
    }
}

int_enum! {
    pub enum HeatingSystemCapability {
        HeatingOnly = 1,
        CoolingOnly = 2,
        HeatingAndCooling = 3,
    }
}

int_enum! {
    pub enum HeatingSystemType {
        Undefined = 0,
        FloorHeating = 1,
        Radiator = 2,
        WallHeating = 3,
        ConvectorPassive = 4,
        ConvectorActive = 5,
        FloorHeatingLowEnergy = 6,
    }
}

/// Well-known scene command indices (0-127). Scenes 0-63 are
/// group-related, 64-127 group-independent.
pub mod scene {
    pub const PRESET_0: u8 = 0;
    pub const AREA_1_OFF: u8 = 1;
    pub const AREA_2_OFF: u8 = 2;
    pub const AREA_3_OFF: u8 = 3;
    pub const AREA_4_OFF: u8 = 4;
    pub const PRESET_1: u8 = 5;
    pub const AREA_1_ON: u8 = 6;
    pub const AREA_2_ON: u8 = 7;
    pub const AREA_3_ON: u8 = 8;
    pub const AREA_4_ON: u8 = 9;
    pub const AREA_STEPPING_CONTINUE: u8 = 10;
    pub const DECREMENT: u8 = 11;
    pub const INCREMENT: u8 = 12;
    pub const MINIMUM: u8 = 13;
    pub const MAXIMUM: u8 = 14;
    pub const STOP: u8 = 15;
    pub const PRESET_2: u8 = 17;
    pub const PRESET_3: u8 = 18;
    pub const PRESET_4: u8 = 19;
    pub const PRESET_12: u8 = 20;
    pub const PRESET_13: u8 = 21;
    pub const PRESET_14: u8 = 22;
    pub const PRESET_22: u8 = 23;
    pub const PRESET_23: u8 = 24;
    pub const PRESET_24: u8 = 25;
    pub const PRESET_32: u8 = 26;
    pub const PRESET_33: u8 = 27;
    pub const PRESET_34: u8 = 28;
    pub const PRESET_42: u8 = 29;
    pub const PRESET_43: u8 = 30;
    pub const PRESET_44: u8 = 31;
    pub const PRESET_10: u8 = 32;
    pub const PRESET_11: u8 = 33;
    pub const PRESET_20: u8 = 34;
    pub const PRESET_21: u8 = 35;
    pub const PRESET_30: u8 = 36;
    pub const PRESET_31: u8 = 37;
    pub const PRESET_40: u8 = 38;
    pub const PRESET_41: u8 = 39;
    pub const AUTO_OFF: u8 = 40;
    pub const IMPULSE: u8 = 41;
    pub const AREA_1_DEC: u8 = 42;
    pub const AREA_1_INC: u8 = 43;
    pub const AREA_2_DEC: u8 = 44;
    pub const AREA_2_INC: u8 = 45;
    pub const AREA_3_DEC: u8 = 46;
    pub const AREA_3_INC: u8 = 47;
    pub const AREA_4_DEC: u8 = 48;
    pub const AREA_4_INC: u8 = 49;
    pub const DEVICE_OFF: u8 = 50;
    pub const DEVICE_ON: u8 = 51;
    pub const AREA_1_STOP: u8 = 52;
    pub const AREA_2_STOP: u8 = 53;
    pub const AREA_3_STOP: u8 = 54;
    pub const AREA_4_STOP: u8 = 55;
    pub const SUN_PROTECTION: u8 = 56;
    pub const AUTO_STANDBY: u8 = 64;
    pub const PANIC: u8 = 65;
    pub const STANDBY: u8 = 67;
    pub const DEEP_OFF: u8 = 68;
    pub const SLEEPING: u8 = 69;
    pub const WAKEUP: u8 = 70;
    pub const PRESENT: u8 = 71;
    pub const ABSENT: u8 = 72;
    pub const DOOR_BELL: u8 = 73;
    pub const ALARM_1: u8 = 74;
    pub const ZONE_ACTIVE: u8 = 75;
    pub const FIRE: u8 = 76;
    pub const ALARM_2: u8 = 83;
    pub const ALARM_3: u8 = 84;
    pub const ALARM_4: u8 = 85;
    pub const WIND: u8 = 86;
    pub const NO_WIND: u8 = 87;
    pub const RAIN: u8 = 88;
    pub const NO_RAIN: u8 = 89;
    pub const HAIL: u8 = 90;
    pub const NO_HAIL: u8 = 91;
    pub const POLLUTION: u8 = 92;
    pub const BURGLARY: u8 = 93;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trips() {
        assert_eq!(ColorGroup::from_i64(2), Some(ColorGroup::Grey));
        assert_eq!(i64::from(ColorGroup::White), 255);
        assert_eq!(ButtonClickType::from_i64(255), Some(ButtonClickType::Idle));
        assert_eq!(OutputMode::from_i64(127), Some(OutputMode::Default));
        assert_eq!(SensorType::from_i64(9999), None);
    }

    #[test]
    fn scene_preset_values() {
        assert_eq!(scene::PRESET_0, 0);
        assert_eq!(scene::PRESET_1, 5);
        assert_eq!(scene::PRESET_2, 17);
        assert_eq!(scene::AREA_4_ON, 9);
    }
}
